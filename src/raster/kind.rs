//! Value kinds of the raster expression graph.
//!
//! Every [`Node`](crate::Node) carries its kind as a type parameter, so operand arity is
//! checked by the compiler: there is no `Add` impl between a `Vector3` and a `Vector4` node.

/// Runtime tag of a node's value kind, recorded with every instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// 32-bit float.
    Float,
    /// 32-bit signed integer.
    Integer,
    /// Boolean.
    Boolean,
    /// Two float lanes.
    Vector2,
    /// Three float lanes.
    Vector3,
    /// Four float lanes.
    Vector4,
    /// 3x3 float matrix, column-major.
    Matrix3,
}

impl ValueType {
    /// WGSL spelling of this type.
    pub fn wgsl(self) -> &'static str {
        match self {
            Self::Float => "f32",
            Self::Integer => "i32",
            Self::Boolean => "bool",
            Self::Vector2 => "vec2<f32>",
            Self::Vector3 => "vec3<f32>",
            Self::Vector4 => "vec4<f32>",
            Self::Matrix3 => "mat3x3<f32>",
        }
    }

    /// Number of float lanes for vector kinds, 1 for scalars, 9 for `Matrix3`.
    pub fn lanes(self) -> usize {
        match self {
            Self::Float | Self::Integer | Self::Boolean => 1,
            Self::Vector2 => 2,
            Self::Vector3 => 3,
            Self::Vector4 => 4,
            Self::Matrix3 => 9,
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A node value kind. Implemented only by the marker types in this module.
pub trait Kind: sealed::Sealed + Copy + 'static {
    /// Runtime tag for this kind.
    const TYPE: ValueType;
}

/// Kinds supporting `+ - * /`, negation, `minimum`, `maximum`, `clamp` and `abs`.
pub trait Numeric: Kind {}

/// Float-lane kinds supporting trigonometry, `step`, `mix` and friends.
pub trait FloatLike: Numeric {}

/// Scalar kinds that can be compared into a [`Boolean`].
pub trait Scalar: Kind {}

/// Float vector kinds.
pub trait VectorKind: FloatLike {
    /// Number of lanes.
    const DIMS: usize;
}

/// Kinds a render target can be produced from.
pub trait Renderable: Kind {}

macro_rules! kinds {
    ($($(#[$doc:meta])* $name:ident => $ty:ident;)*) => {
        $(
            $(#[$doc])*
            #[derive(Clone, Copy, Debug, PartialEq, Eq)]
            pub struct $name;

            impl sealed::Sealed for $name {}

            impl Kind for $name {
                const TYPE: ValueType = ValueType::$ty;
            }
        )*
    };
}

kinds! {
    /// 32-bit float kind.
    Float => Float;
    /// 32-bit signed integer kind.
    Integer => Integer;
    /// Boolean kind.
    Boolean => Boolean;
    /// Two-lane float vector kind.
    Vector2 => Vector2;
    /// Three-lane float vector kind.
    Vector3 => Vector3;
    /// Four-lane float vector kind.
    Vector4 => Vector4;
    /// 3x3 float matrix kind.
    Matrix3 => Matrix3;
}

impl Numeric for Float {}
impl Numeric for Integer {}
impl Numeric for Vector2 {}
impl Numeric for Vector3 {}
impl Numeric for Vector4 {}

impl FloatLike for Float {}
impl FloatLike for Vector2 {}
impl FloatLike for Vector3 {}
impl FloatLike for Vector4 {}

impl Scalar for Float {}
impl Scalar for Integer {}

impl VectorKind for Vector2 {
    const DIMS: usize = 2;
}
impl VectorKind for Vector3 {
    const DIMS: usize = 3;
}
impl VectorKind for Vector4 {
    const DIMS: usize = 4;
}

impl Renderable for Float {}
impl Renderable for Integer {}
impl Renderable for Boolean {}
impl Renderable for Vector2 {}
impl Renderable for Vector3 {}
impl Renderable for Vector4 {}
