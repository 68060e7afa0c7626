use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Sub, SubAssign};

use approx::abs_diff_eq;
use ordered_float::OrderedFloat;
use strum::{EnumIter, FromRepr};

/// Functional Road Class.
/// The functional road class (FRC) of a line is a road classification
/// based on the importance of the road represented by the line.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, EnumIter, FromRepr,
)]
#[repr(u8)]
pub enum Frc {
    /// Main road, highest importance
    Frc0 = 0,
    /// First class road.
    Frc1 = 1,
    /// Second class road.
    Frc2 = 2,
    /// Third class road.
    Frc3 = 3,
    /// Fourth class road.
    Frc4 = 4,
    /// Fifth class road.
    Frc5 = 5,
    /// Sixth class road.
    Frc6 = 6,
    /// Other class road, lowest importance
    #[default]
    Frc7 = 7,
}

impl Frc {
    pub const fn value(&self) -> u8 {
        *self as u8
    }

    /// Returns the FRC that is `variance` classes less important than this one, saturating at
    /// the least important class.
    pub fn with_variance(&self, variance: u8) -> Self {
        Self::from_repr(self.value().saturating_add(variance)).unwrap_or(Self::Frc7)
    }

    /// Rates how close two FRCs are: equal classes score 1 and every class of difference
    /// removes a fifth of the score.
    pub fn rating(&self, other: &Self) -> Score {
        let difference = self.value().abs_diff(other.value());
        Score::from(1.0 - 0.2 * f64::from(difference)).max(Score::ZERO)
    }
}

/// Form of Way.
/// The form of way (FOW) describes the physical road type of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, EnumIter)]
#[repr(u8)]
pub enum Fow {
    /// The physical road type is unknown.
    Undefined = 0,
    /// A Motorway is defined as a road permitted for motorized vehicles
    /// only in combination with a prescribed minimum speed. It has two
    /// or more physically separated carriageways and no single level-crossings.
    Motorway = 1,
    /// A multiple carriageway is defined as a road with physically separated
    /// carriageways regardless of the number of lanes. If a road is also a
    /// motorway, it should be coded as such and not as a multiple carriageway.
    MultipleCarriageway = 2,
    /// All roads without separate carriageways are considered as roads with
    /// a single carriageway.
    SingleCarriageway = 3,
    /// A Roundabout is a road which forms a ring on which traffic traveling
    /// in only one direction is allowed.
    Roundabout = 4,
    /// A Traffic Square is an open area (partly) enclosed by roads which is
    /// used for non-traffic purposes and which is not a Roundabout.
    TrafficSquare = 5,
    /// A Slip Road is a road especially designed to enter or leave a line.
    SlipRoad = 6,
    /// The physical road type is known but does not fit into one of the
    /// other categories.
    #[default]
    Other = 7,
}

impl Fow {
    /// Rates how similar two forms of way are.
    pub fn rating(&self, other: &Self) -> Score {
        use Fow::*;
        let rating = match (*self, *other) {
            (a, b) if a == b => 1.0,
            (Undefined, _) | (_, Undefined) => 0.5,
            (Motorway, MultipleCarriageway) | (MultipleCarriageway, Motorway) => 0.75,
            (SingleCarriageway, MultipleCarriageway) | (MultipleCarriageway, SingleCarriageway) => {
                0.75
            }
            (SlipRoad, Motorway | MultipleCarriageway) | (Motorway | MultipleCarriageway, SlipRoad) => {
                0.5
            }
            (Other, _) | (_, Other) => 0.5,
            _ => 0.25,
        };
        Score::from(rating)
    }
}

/// The side of road information (SOR) describes the relationship between the
/// point of interest and a referenced line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum SideOfRoad {
    /// Point is directly on (or above) the road, or determination of right/left
    /// side is not applicable.
    #[default]
    OnRoadOrUnknown = 0,
    /// Point is on right side of the road.
    Right = 1,
    /// Point is on left side of the road.
    Left = 2,
    /// Point is on both sides of the road.
    Both = 3,
}

/// The orientation information (ORI) describes the relationship between the
/// point of interest and the direction of a referenced line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum Orientation {
    /// Point has no sense of orientation, or determination of orientation
    /// is not applicable
    #[default]
    Unknown = 0,
    /// Point has orientation from first LRP towards second LRP.
    Forward = 1,
    /// Point has orientation from second LRP towards first LRP.
    Backward = 2,
    /// Point has orientation in both directions
    Both = 3,
}

/// Distance in meters.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Length(OrderedFloat<f64>);

impl fmt::Debug for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.0)
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}m", self.0)
    }
}

impl Length {
    pub const ZERO: Self = Self(OrderedFloat(0.0));
    pub const MAX: Self = Self(OrderedFloat(f64::MAX));
    /// The maximum distance between two consecutive LRPs allowed by the OpenLR data format.
    pub const MAX_LRP_DISTANCE: Self = Self(OrderedFloat(15000.0));

    pub const fn from_meters(meters: f64) -> Self {
        Self(OrderedFloat(meters))
    }

    pub const fn meters(&self) -> f64 {
        self.0.0
    }

    pub fn round(&self) -> Self {
        Self::from_meters(self.meters().round())
    }

    pub fn is_zero(&self) -> bool {
        self.meters() == 0.0
    }

    /// Returns the ratio of this length to the total, 0 for an empty total.
    pub fn ratio_of(&self, total: Length) -> f64 {
        if total.meters() > 0.0 {
            self.meters() / total.meters()
        } else {
            0.0
        }
    }
}

impl Add for Length {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Length {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Length {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Length {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Mul<f64> for Length {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Div<f64> for Length {
    type Output = Self;
    fn div(self, rhs: f64) -> Self::Output {
        Self(self.0 / rhs)
    }
}

impl Sum for Length {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, length| acc + length)
    }
}

/// The bearing describes the angle between the true North and the road.
/// The physical data format defines the bearing field as an integer value between 0
/// and 360 whereby “0” is included and “360” is excluded from that range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Bearing(u16);

impl Bearing {
    pub const fn from_degrees(degrees: u16) -> Self {
        Self(degrees % 360)
    }

    /// Rounds the given (possibly negative or greater than 360) angle to the bearing range.
    pub fn from_degrees_f64(degrees: f64) -> Self {
        let degrees = degrees.rem_euclid(360.0).round() as u16;
        Self::from_degrees(degrees)
    }

    pub const fn degrees(&self) -> u16 {
        self.0
    }

    /// Returns the smallest angle between the two bearings, in `[0, 180]`.
    pub const fn difference(&self, other: &Self) -> Bearing {
        let difference = self.0.abs_diff(other.0);
        if difference > 180 {
            Self(360 - difference)
        } else {
            Self(difference)
        }
    }

    /// Rates the angle between the two bearings: 1 for equal bearings, 0 for opposite ones.
    pub fn rating(&self, other: &Self) -> Score {
        let difference = f64::from(self.difference(other).degrees());
        Score::from((180.0 - difference) / 180.0)
    }
}

/// Coordinate pair stands for a pair of WGS84 longitude (lon) and latitude (lat) values.
/// This coordinate pair specifies a geometric point in a digital map.
#[derive(Debug, Clone, Copy, Default)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        const EPSILON: f64 = 1e-7;
        abs_diff_eq!(self.lon, other.lon, epsilon = EPSILON)
            && abs_diff_eq!(self.lat, other.lat, epsilon = EPSILON)
    }
}

impl From<Coordinate> for geo::Point {
    fn from(coordinate: Coordinate) -> Self {
        geo::Point::new(coordinate.lon, coordinate.lat)
    }
}

/// Axis aligned box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Coordinate,
    pub max: Coordinate,
}

impl BoundingBox {
    /// Approximate box around the coordinate covering at least the given radius.
    pub fn around(center: Coordinate, radius: Length) -> Self {
        const METERS_PER_DEGREE: f64 = 111_320.0;
        let lat_delta = radius.meters() / METERS_PER_DEGREE;
        let lon_delta = lat_delta / center.lat.to_radians().cos().abs().max(0.01);

        Self {
            min: Coordinate {
                lon: center.lon - lon_delta,
                lat: center.lat - lat_delta,
            },
            max: Coordinate {
                lon: center.lon + lon_delta,
                lat: center.lat + lat_delta,
            },
        }
    }

    pub fn contains(&self, coordinate: Coordinate) -> bool {
        (self.min.lon..=self.max.lon).contains(&coordinate.lon)
            && (self.min.lat..=self.max.lat).contains(&coordinate.lat)
    }

    /// Returns the smallest box containing all the given coordinates.
    pub fn from_coordinates(coordinates: impl IntoIterator<Item = Coordinate>) -> Option<Self> {
        coordinates.into_iter().fold(None, |bbox, c| {
            let Some(BoundingBox { min, max }) = bbox else {
                return Some(Self { min: c, max: c });
            };

            Some(Self {
                min: Coordinate {
                    lon: min.lon.min(c.lon),
                    lat: min.lat.min(c.lat),
                },
                max: Coordinate {
                    lon: max.lon.max(c.lon),
                    lat: max.lat.max(c.lat),
                },
            })
        })
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.min.lon <= other.max.lon
            && other.min.lon <= self.max.lon
            && self.min.lat <= other.max.lat
            && other.min.lat <= self.max.lat
    }
}

/// Rating of a candidate, combined multiplicatively across dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Score(OrderedFloat<f64>);

impl Score {
    pub const ZERO: Self = Self(OrderedFloat(0.0));
    pub const ONE: Self = Self(OrderedFloat(1.0));

    pub const fn value(&self) -> f64 {
        self.0.0
    }

    pub fn is_positive(&self) -> bool {
        self.value() > 0.0
    }
}

impl From<f64> for Score {
    fn from(value: f64) -> Self {
        Self(OrderedFloat(value))
    }
}

impl Mul for Score {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self::Output {
        Self(self.0 * rhs.0)
    }
}

impl MulAssign for Score {
    fn mul_assign(&mut self, rhs: Self) {
        self.0 *= rhs.0;
    }
}

/// Line attributes are part of a location reference point and consist of functional road
/// class (FRC), form of way (FOW) and bearing (BEAR) data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineAttributes {
    pub frc: Frc,
    pub fow: Fow,
    pub bearing: Bearing,
}

/// The path attributes are part of a location reference point (except for the last
/// location reference point) and consists of lowest functional road class to next point
/// (LFRCNP) and distance to next point (DNP) data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PathAttributes {
    /// Lowest functional road class to next point.
    pub lfrcnp: Frc,
    /// Distance to next point.
    pub dnp: Length,
}

/// The basis of a location reference is a sequence of location reference points (LRPs).
/// A single LRP may be bound to the road network. In such a case all values of the LRP
/// refer to a node or line within the road network. The coordinates refer to a node of
/// a line or a point on a line and the additional attributes refer to attributes of a line.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub coordinate: Coordinate,
    pub line: LineAttributes,
    pub path: Option<PathAttributes>,
}

impl Point {
    pub const fn is_last(&self) -> bool {
        self.path.is_none()
    }

    pub fn dnp(&self) -> Length {
        self.path.map(|p| p.dnp).unwrap_or(Length::ZERO)
    }

    pub fn lfrcnp(&self) -> Frc {
        self.path.map(|p| p.lfrcnp).unwrap_or(Frc::Frc7)
    }
}

/// Offset expressed as a percentage of the length of the referenced line, in `[0, 100)`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Offset(f64);

impl Offset {
    pub const ZERO: Self = Self(0.0);

    pub const fn from_percentage(percentage: f64) -> Self {
        Self(percentage)
    }

    pub const fn percentage(&self) -> f64 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        (0.0..100.0).contains(&self.0)
    }
}

/// Offsets are used to locate the start and end of a location more precisely than
/// bounding to the nodes in a network. The logical format defines two offsets,
/// one at the start of the location and one at the end of the location.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Offsets {
    pub pos: Offset,
    pub neg: Offset,
}

impl Offsets {
    /// Largest sum of offsets produced by the conversions below.
    const MAX_PERCENTAGE: f64 = 99.99;

    pub fn is_valid(&self) -> bool {
        self.pos.is_valid()
            && self.neg.is_valid()
            && self.pos.percentage() + self.neg.percentage() < 100.0
    }

    /// Converts the offset distances into percentages of the total length.
    /// The result is not necessarily valid, for example if the offsets exceed the total length.
    pub fn from_lengths(pos: Length, neg: Length, total: Length) -> Self {
        Self {
            pos: Offset::from_percentage(pos.ratio_of(total) * 100.0),
            neg: Offset::from_percentage(neg.ratio_of(total) * 100.0),
        }
    }

    /// Gets the offset distances along a line of the given total length.
    pub fn lengths(&self, total: Length) -> (Length, Length) {
        (
            total * (self.pos.percentage() / 100.0),
            total * (self.neg.percentage() / 100.0),
        )
    }

    /// Clamps the offsets so that they are valid, the positive offset takes precedence.
    pub fn sanitized(&self) -> Self {
        let finite = |p: f64| if p.is_finite() { p } else { 0.0 };
        let pos = finite(self.pos.percentage()).clamp(0.0, Self::MAX_PERCENTAGE);
        let neg = finite(self.neg.percentage()).clamp(0.0, Self::MAX_PERCENTAGE - pos);

        Self {
            pos: Offset::from_percentage(pos),
            neg: Offset::from_percentage(neg),
        }
    }
}

/// A line location reference describes a path within a map and consists of location
/// reference point(s), a last location reference point and offset data.
/// There must be at least one location reference point and exactly one last location
/// reference point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    pub points: Vec<Point>,
    pub offsets: Offsets,
}

/// Point along line is a point location which is defined by a line and an offset value.
/// The line will be referenced by two location reference points and the concrete position
/// on that line is referenced using the positive offset. Additionally information about
/// the side of the road where the point is located and the orientation with respect
/// to the direction of the line can be added.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointAlongLine {
    pub points: [Point; 2],
    pub offset: Offset,
    pub orientation: Orientation,
    pub side: SideOfRoad,
}

/// A circle location is given by the position of the center and the radius.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Circle {
    pub center: Coordinate,
    pub radius: Length,
}

/// A rectangle location reference consists of the lower left corner point and the upper
/// right corner point.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rectangle {
    pub lower_left: Coordinate,
    pub upper_right: Coordinate,
}

/// A grid location is a base rectangle (the lower left cell of the grid) multiplied to the
/// North by the number of rows and to the East by the number of columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grid {
    pub rect: Rectangle,
    pub size: GridSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GridSize {
    pub columns: u16,
    pub rows: u16,
}

/// A polygon location is a non-intersecting shape defined by a sequence of corners.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polygon {
    pub corners: Vec<Coordinate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
#[repr(u8)]
pub enum LocationType {
    Line = 0,
    GeoCoordinate = 1,
    PointAlongLine = 2,
    Circle = 4,
    Rectangle = 5,
    Grid = 6,
    Polygon = 7,
}

/// Map independent location reference.
///
/// Locations bound to the road network are covered by a concatenation of shortest-paths between
/// consecutive location reference points; offsets trim the covering path down to the location.
/// Locations that are not bound to the road network are plain geometries.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationReference {
    // Line Locations
    Line(Line),
    // Point Locations
    GeoCoordinate(Coordinate),
    PointAlongLine(PointAlongLine),
    // Area Locations
    Circle(Circle),
    Rectangle(Rectangle),
    Grid(Grid),
    Polygon(Polygon),
}

impl LocationReference {
    pub const fn location_type(&self) -> LocationType {
        match self {
            Self::Line(_) => LocationType::Line,
            Self::GeoCoordinate(_) => LocationType::GeoCoordinate,
            Self::PointAlongLine(_) => LocationType::PointAlongLine,
            Self::Circle(_) => LocationType::Circle,
            Self::Rectangle(_) => LocationType::Rectangle,
            Self::Grid(_) => LocationType::Grid,
            Self::Polygon(_) => LocationType::Polygon,
        }
    }
}
