//! Tagged geographic records.
//!
//! A [`FeatureCollection`] is the unit of exchange between the layer merger,
//! the scene composer and renderers. Every [`Feature`] carries its geometry,
//! a free-form attribute map, the layer it was read from, and the flags the
//! pipeline injects: its [`Role`] and whether it is highlighted.

use std::fmt;

use geo::{BoundingRect, Geometry, Rect};
use indexmap::IndexMap;

/// A single attribute value read from a geodata source.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl AttributeValue {
    /// Returns the text payload, if this is a [`AttributeValue::Text`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns `true` for [`AttributeValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Ordered attribute map of a feature. Field order follows the source schema.
pub type Attributes = IndexMap<String, AttributeValue>;

/// The part a feature plays in a composed map.
///
/// Exactly one role holds per feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Role {
    /// Primary territory; drives viewport fitting.
    Main,
    /// Context territory, drawn below the main territory.
    #[default]
    Secondary,
    /// User supplied geometry drawn above all territories, never filtered.
    Overlay,
}

impl Role {
    pub fn name(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Secondary => "secondary",
            Self::Overlay => "overlay",
        }
    }
}

/// Coarse classification of a geometry, used to weight simplification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Point,
    Line,
    Polygon,
    Mixed,
}

impl GeometryKind {
    /// Classifies a `geo` geometry.
    pub fn of(geometry: &Geometry<f64>) -> Self {
        match geometry {
            Geometry::Point(_) | Geometry::MultiPoint(_) => Self::Point,
            Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {
                Self::Line
            }
            Geometry::Polygon(_)
            | Geometry::MultiPolygon(_)
            | Geometry::Rect(_)
            | Geometry::Triangle(_) => Self::Polygon,
            Geometry::GeometryCollection(_) => Self::Mixed,
        }
    }
}

/// A geometry with attributes, provenance and pipeline flags.
///
/// # Examples
///
/// ```
/// # use carta_core::feature::{Feature, Role};
/// # use geo::{point, Geometry};
/// let feature = Feature::new(Some(Geometry::Point(point!(x: 1.0, y: 2.0))))
///     .with_attribute("NAME_1", "Bayern")
///     .with_layer("ADM_ADM_1")
///     .with_role(Role::Main);
///
/// assert!(feature.is_main());
/// assert!(!feature.is_highlighted());
/// assert_eq!(feature.layer(), Some("ADM_ADM_1"));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Feature {
    geometry: Option<Geometry<f64>>,
    attributes: Attributes,
    layer: Option<String>,
    role: Role,
    highlight: bool,
}

impl Feature {
    /// Creates an untagged feature. A `None` geometry is a null record.
    pub fn new(geometry: Option<Geometry<f64>>) -> Self {
        Self {
            geometry,
            ..Self::default()
        }
    }

    /// Creates a feature with an attribute map.
    pub fn with_attributes(geometry: Option<Geometry<f64>>, attributes: Attributes) -> Self {
        Self {
            geometry,
            attributes,
            ..Self::default()
        }
    }

    /// Adds one attribute, keeping insertion order.
    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Tags the feature with its originating layer.
    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn geometry(&self) -> Option<&Geometry<f64>> {
        self.geometry.as_ref()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Returns a single attribute value.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Originating layer name; `None` for unnamed single-layer sources.
    pub fn layer(&self) -> Option<&str> {
        self.layer.as_deref()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_main(&self) -> bool {
        self.role == Role::Main
    }

    pub fn is_overlay(&self) -> bool {
        self.role == Role::Overlay
    }

    pub fn is_secondary(&self) -> bool {
        self.role == Role::Secondary
    }

    /// The raw highlight flag.
    pub fn highlight(&self) -> bool {
        self.highlight
    }

    /// Highlighting only applies to main features.
    pub fn is_highlighted(&self) -> bool {
        self.highlight && self.is_main()
    }

    pub fn set_geometry(&mut self, geometry: Option<Geometry<f64>>) {
        self.geometry = geometry;
    }

    pub fn set_layer(&mut self, layer: Option<String>) {
        self.layer = layer;
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    pub fn set_highlight(&mut self, highlight: bool) {
        self.highlight = highlight;
    }

    /// Takes the geometry out of the feature, leaving a null record.
    pub fn take_geometry(&mut self) -> Option<Geometry<f64>> {
        self.geometry.take()
    }

    /// Bounding rectangle of the geometry, `None` for null or empty geometries.
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.geometry.as_ref().and_then(|geometry| geometry.bounding_rect())
    }

    /// Classification of the geometry, if any.
    pub fn kind(&self) -> Option<GeometryKind> {
        self.geometry.as_ref().map(GeometryKind::of)
    }
}

/// An ordered sequence of features.
///
/// Order is significant: renderers draw features in collection order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureCollection {
    features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Feature> {
        self.features.iter_mut()
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    /// Appends all features of `other`, preserving both orders.
    pub fn append(&mut self, other: FeatureCollection) {
        self.features.extend(other.features);
    }

    /// Keeps only the features matching `predicate`.
    pub fn retain(&mut self, predicate: impl FnMut(&Feature) -> bool) {
        self.features.retain(predicate);
    }

    /// Tags every feature with `role`.
    pub fn with_role(mut self, role: Role) -> Self {
        for feature in &mut self.features {
            feature.set_role(role);
        }
        self
    }

    /// Returns the features holding `role`, in collection order.
    pub fn by_role(&self, role: Role) -> impl Iterator<Item = &Feature> {
        self.features.iter().filter(move |feature| feature.role() == role)
    }

    /// Combined bounding rectangle of all geometries, `None` if there are none.
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        bounding_rect_of(self.features.iter())
    }

    pub fn as_slice(&self) -> &[Feature] {
        &self.features
    }

    pub fn into_vec(self) -> Vec<Feature> {
        self.features
    }
}

impl From<Vec<Feature>> for FeatureCollection {
    fn from(features: Vec<Feature>) -> Self {
        Self { features }
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

impl<'a> IntoIterator for &'a FeatureCollection {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

/// Combined bounding rectangle of a set of features.
pub fn bounding_rect_of<'a>(features: impl IntoIterator<Item = &'a Feature>) -> Option<Rect<f64>> {
    features
        .into_iter()
        .filter_map(Feature::bounding_rect)
        .reduce(|acc, rect| {
            Rect::new(
                geo::coord! {
                    x: acc.min().x.min(rect.min().x),
                    y: acc.min().y.min(rect.min().y),
                },
                geo::coord! {
                    x: acc.max().x.max(rect.max().x),
                    y: acc.max().y.max(rect.max().y),
                },
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    use geo::{LineString, Point, polygon};

    fn square(x: f64, y: f64, size: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
            (x: x, y: y),
        ])
    }

    #[test]
    fn test_attribute_value_display() {
        assert_eq!(AttributeValue::from("Berlin").to_string(), "Berlin");
        assert_eq!(AttributeValue::from(3.0).to_string(), "3");
        assert_eq!(AttributeValue::from(true).to_string(), "true");
        assert_eq!(AttributeValue::Null.to_string(), "");
        assert!(AttributeValue::Null.is_null());
        assert_eq!(AttributeValue::from("x").as_str(), Some("x"));
    }

    #[test]
    fn test_feature_defaults() {
        let feature = Feature::new(None);
        assert_eq!(feature.role(), Role::Secondary);
        assert!(!feature.highlight());
        assert!(feature.layer().is_none());
        assert!(feature.bounding_rect().is_none());
        assert!(feature.kind().is_none());
    }

    #[test]
    fn test_highlight_requires_main() {
        let mut feature = Feature::new(Some(square(0.0, 0.0, 1.0)));
        feature.set_highlight(true);
        assert!(feature.highlight());
        assert!(!feature.is_highlighted());

        feature.set_role(Role::Main);
        assert!(feature.is_highlighted());
    }

    #[test]
    fn test_roles_are_exclusive() {
        for role in [Role::Main, Role::Secondary, Role::Overlay] {
            let feature = Feature::new(None).with_role(role);
            let flags = [feature.is_main(), feature.is_secondary(), feature.is_overlay()];
            assert_eq!(flags.iter().filter(|flag| **flag).count(), 1);
        }
    }

    #[test]
    fn test_geometry_kind() {
        assert_eq!(
            GeometryKind::of(&Geometry::Point(Point::new(0.0, 0.0))),
            GeometryKind::Point
        );
        assert_eq!(
            GeometryKind::of(&Geometry::LineString(LineString::from(vec![
                (0.0, 0.0),
                (1.0, 1.0)
            ]))),
            GeometryKind::Line
        );
        assert_eq!(GeometryKind::of(&square(0.0, 0.0, 1.0)), GeometryKind::Polygon);
    }

    #[test]
    fn test_collection_bounding_rect() {
        let collection: FeatureCollection = vec![
            Feature::new(Some(square(0.0, 0.0, 1.0))),
            Feature::new(None),
            Feature::new(Some(square(5.0, -2.0, 1.0))),
        ]
        .into();

        let rect = collection.bounding_rect().unwrap();
        assert_eq!(rect.min().x, 0.0);
        assert_eq!(rect.min().y, -2.0);
        assert_eq!(rect.max().x, 6.0);
        assert_eq!(rect.max().y, 1.0);
    }

    #[test]
    fn test_collection_role_tagging_and_order() {
        let mut main: FeatureCollection = vec![
            Feature::new(None).with_attribute("id", "a"),
            Feature::new(None).with_attribute("id", "b"),
        ]
        .into();
        main = main.with_role(Role::Main);

        let overlay: FeatureCollection = vec![Feature::new(None).with_attribute("id", "c")]
            .into_iter()
            .collect::<FeatureCollection>()
            .with_role(Role::Overlay);

        main.append(overlay);
        assert_eq!(main.len(), 3);
        assert_eq!(main.by_role(Role::Main).count(), 2);
        assert_eq!(main.by_role(Role::Overlay).count(), 1);

        let ids: Vec<_> = main
            .iter()
            .filter_map(|feature| feature.attribute("id").and_then(AttributeValue::as_str))
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn test_empty_collection_has_no_bounds() {
        assert!(FeatureCollection::new().bounding_rect().is_none());
    }
}
