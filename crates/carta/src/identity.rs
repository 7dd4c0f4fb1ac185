//! Region identity field resolution.
//!
//! Hide and highlight filters match records by the value of one attribute
//! column. Which column that is depends on the schema of the source; an
//! [`IdentityFieldResolver`] decides it from the layer name and the field
//! names. [`NameFieldResolver`] implements the `NAME_<n>` convention of
//! administrative boundary packages.

use carta_core::feature::{AttributeValue, Feature};

/// Picks the attribute column that identifies regions of a layer.
pub trait IdentityFieldResolver: Send + Sync {
    /// Returns the identity field for `layer`, or `None` if the schema has none.
    ///
    /// `layer` is `None` for unnamed single-layer sources.
    fn resolve(&self, layer: Option<&str>, fields: &[&str]) -> Option<String>;
}

/// Resolves `NAME_<n>` where `<n>` is the trailing `_` separated token of the
/// layer name, e.g. `ADM_ADM_2` -> `NAME_2`. Falls back to the first field
/// starting with `NAME_`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameFieldResolver;

const NAME_PREFIX: &str = "NAME_";

impl IdentityFieldResolver for NameFieldResolver {
    fn resolve(&self, layer: Option<&str>, fields: &[&str]) -> Option<String> {
        let conventional = layer
            .and_then(|layer| layer.rsplit('_').next())
            .filter(|suffix| !suffix.is_empty())
            .map(|suffix| format!("{NAME_PREFIX}{suffix}"))
            .filter(|field| fields.contains(&field.as_str()));

        if conventional.is_some() {
            return conventional;
        }

        fields
            .iter()
            .find(|field| field.starts_with(NAME_PREFIX))
            .map(|field| field.to_string())
    }
}

/// Identity value of a record: the text of the identity field, or the empty
/// string if there is no identity field or the value is missing.
pub fn identity_value(feature: &Feature, field: Option<&str>) -> String {
    field
        .and_then(|field| feature.attribute(field))
        .map(|value| match value {
            AttributeValue::Null => String::new(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conventional_field() {
        let resolver = NameFieldResolver;
        let fields = ["GID_0", "NAME_0", "GID_1", "NAME_1"];
        assert_eq!(
            resolver.resolve(Some("ADM_ADM_1"), &fields).as_deref(),
            Some("NAME_1")
        );
        assert_eq!(
            resolver.resolve(Some("ADM_ADM_0"), &fields).as_deref(),
            Some("NAME_0")
        );
    }

    #[test]
    fn test_fallback_to_first_name_field() {
        let resolver = NameFieldResolver;
        let fields = ["ID", "NAME_ENGLISH", "NAME_LOCAL"];
        assert_eq!(
            resolver.resolve(Some("ADM_ADM_3"), &fields).as_deref(),
            Some("NAME_ENGLISH")
        );
        assert_eq!(resolver.resolve(None, &fields).as_deref(), Some("NAME_ENGLISH"));
    }

    #[test]
    fn test_no_identity_field() {
        let resolver = NameFieldResolver;
        assert_eq!(resolver.resolve(Some("roads"), &["ID", "TYPE"]), None);
        assert_eq!(resolver.resolve(None, &[]), None);
    }

    #[test]
    fn test_identity_value() {
        let feature = Feature::new(None)
            .with_attribute("NAME_1", "Bayern")
            .with_attribute("NAME_2", AttributeValue::Null);

        assert_eq!(identity_value(&feature, Some("NAME_1")), "Bayern");
        assert_eq!(identity_value(&feature, Some("NAME_2")), "");
        assert_eq!(identity_value(&feature, Some("MISSING")), "");
        assert_eq!(identity_value(&feature, None), "");
    }
}
