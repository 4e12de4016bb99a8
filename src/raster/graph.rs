use std::cell::RefCell;
use std::marker::PhantomData;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use crate::foundation::error::{DepthError, DepthResult};
use crate::foundation::grid::PixelGrid;
use crate::raster::backend::{BackendKind, RasterBackend, create_backend};
use crate::raster::kind::{
    Boolean, Float, FloatLike, Integer, Kind, Matrix3, Numeric, Renderable, Scalar, ValueType,
    Vector2, Vector3, Vector4, VectorKind,
};
use crate::raster::program::{
    CustomOp, Expr, Instr, Literal, MethodOp, NodeId, Operator, RasterProgram, SymbolOp, lower,
};

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

/// Owner of a raster backend. Graphs are bound against it one at a time.
///
/// [`RasterContext::bind`] borrows the context mutably for the lifetime of the returned
/// [`ShaderGraph`], so two graphs can never interleave renders on one context.
pub struct RasterContext {
    backend: Box<dyn RasterBackend>,
}

impl RasterContext {
    /// Wrap an existing backend.
    pub fn new(backend: Box<dyn RasterBackend>) -> Self {
        Self { backend }
    }

    /// Create a context backed by a fresh backend of `kind`.
    pub fn with_backend(kind: BackendKind) -> DepthResult<Self> {
        Ok(Self::new(create_backend(kind)?))
    }

    /// Kind of the backend executing this context's programs.
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Bind a new, empty graph rendering onto a `width x height` target.
    pub fn bind(&mut self, width: u32, height: u32) -> ShaderGraph<'_> {
        let id = NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(graph = id, width, height, "bind shader graph");
        ShaderGraph {
            state: GraphState {
                id,
                width,
                height,
                instrs: RefCell::new(Vec::new()),
                inputs: RefCell::new(Vec::new()),
            },
            backend: RefCell::new(self.backend.as_mut()),
        }
    }
}

pub(crate) struct GraphState {
    id: u64,
    width: u32,
    height: u32,
    instrs: RefCell<Vec<Instr>>,
    inputs: RefCell<Vec<Arc<PixelGrid>>>,
}

impl GraphState {
    fn push(&self, ty: ValueType, expr: Expr) -> NodeId {
        let mut instrs = self.instrs.borrow_mut();
        let id = NodeId(instrs.len() as u32);
        instrs.push(Instr { id, ty, expr });
        id
    }

    fn node<K: Kind>(&self, expr: Expr) -> Node<'_, K> {
        Node {
            state: self,
            id: self.push(K::TYPE, expr),
            _kind: PhantomData,
        }
    }

    fn check_owned(&self, node_state: &GraphState) {
        assert!(
            std::ptr::eq(self, node_state),
            "node from shader graph #{} used in shader graph #{}",
            node_state.id,
            self.id
        );
    }
}

/// A bound compilation context: records instructions, then renders them.
///
/// Lifecycle: [`RasterContext::bind`] → build nodes → [`ShaderGraph::render`] (any number of
/// times) → [`ShaderGraph::purge`] or drop.
pub struct ShaderGraph<'c> {
    state: GraphState,
    backend: RefCell<&'c mut dyn RasterBackend>,
}

impl<'c> ShaderGraph<'c> {
    /// Target width in pixels.
    pub fn width(&self) -> u32 {
        self.state.width
    }

    /// Target height in pixels.
    pub fn height(&self) -> u32 {
        self.state.height
    }

    /// Number of instructions recorded so far.
    pub fn instruction_count(&self) -> usize {
        self.state.instrs.borrow().len()
    }

    /// A float constant.
    ///
    /// # Panics
    /// If `v` is not finite; WGSL has no literal spelling for it.
    pub fn float(&self, v: f32) -> Node<'_, Float> {
        assert!(v.is_finite(), "non-finite float literal {v}");
        self.state.node(Expr::Literal(Literal::Float(v)))
    }

    /// An integer constant.
    pub fn integer(&self, v: i32) -> Node<'_, Integer> {
        self.state.node(Expr::Literal(Literal::Integer(v)))
    }

    /// A boolean constant.
    pub fn boolean(&self, v: bool) -> Node<'_, Boolean> {
        self.state.node(Expr::Literal(Literal::Boolean(v)))
    }

    /// Pixel-center coordinate of the fragment being evaluated (`x + 0.5, y + 0.5`).
    pub fn frag_coord(&self) -> Node<'_, Vector2> {
        self.state.node(Expr::FragCoord)
    }

    /// Target size in pixels.
    pub fn resolution(&self) -> Node<'_, Vector2> {
        self.state.node(Expr::Resolution)
    }

    /// Bind `grid` as a read-only texture and sample it at the current fragment.
    ///
    /// Channels are normalized to `[0, 1]`. The grid must match the target size.
    pub fn texture(&self, grid: impl Into<Arc<PixelGrid>>) -> DepthResult<Node<'_, Vector4>> {
        let grid = grid.into();
        if grid.width() != self.state.width || grid.height() != self.state.height {
            return Err(DepthError::validation(format!(
                "texture is {}x{}, raster target is {}x{}",
                grid.width(),
                grid.height(),
                self.state.width,
                self.state.height
            )));
        }
        let slot = {
            let mut inputs = self.state.inputs.borrow_mut();
            match inputs.iter().position(|g| Arc::ptr_eq(g, &grid)) {
                Some(slot) => slot,
                None => {
                    inputs.push(grid);
                    inputs.len() - 1
                }
            }
        };
        Ok(self.state.node(Expr::Input(slot as u32)))
    }

    /// Build a `Vector2` from two floats.
    pub fn vec2<'g>(&'g self, x: Node<'g, Float>, y: Node<'g, Float>) -> Node<'g, Vector2> {
        self.construct(&[x.owned_by(self), y.owned_by(self)])
    }

    /// Build a `Vector3` from three floats.
    pub fn vec3<'g>(
        &'g self,
        x: Node<'g, Float>,
        y: Node<'g, Float>,
        z: Node<'g, Float>,
    ) -> Node<'g, Vector3> {
        self.construct(&[x.owned_by(self), y.owned_by(self), z.owned_by(self)])
    }

    /// Build a `Vector4` from four floats.
    pub fn vec4<'g>(
        &'g self,
        x: Node<'g, Float>,
        y: Node<'g, Float>,
        z: Node<'g, Float>,
        w: Node<'g, Float>,
    ) -> Node<'g, Vector4> {
        self.construct(&[
            x.owned_by(self),
            y.owned_by(self),
            z.owned_by(self),
            w.owned_by(self),
        ])
    }

    /// Build a `Vector4` from a `Vector3` and a fourth lane.
    pub fn extend<'g>(&'g self, xyz: Node<'g, Vector3>, w: Node<'g, Float>) -> Node<'g, Vector4> {
        self.construct(&[xyz.owned_by(self), w.owned_by(self)])
    }

    /// Build a `Matrix3` from three column vectors.
    pub fn mat3<'g>(
        &'g self,
        c0: Node<'g, Vector3>,
        c1: Node<'g, Vector3>,
        c2: Node<'g, Vector3>,
    ) -> Node<'g, Matrix3> {
        self.construct(&[c0.owned_by(self), c1.owned_by(self), c2.owned_by(self)])
    }

    /// `1` where `x >= edge`, else `0`, lane-wise.
    pub fn step<'g, K: FloatLike>(&'g self, edge: Node<'g, K>, x: Node<'g, K>) -> Node<'g, K> {
        self.apply(MethodOp::Step, &[edge.owned_by(self), x.owned_by(self)])
    }

    /// Linear blend `a + (b - a) * t`, lane-wise.
    pub fn mix<'g, K: FloatLike>(
        &'g self,
        a: Node<'g, K>,
        b: Node<'g, K>,
        t: Node<'g, K>,
    ) -> Node<'g, K> {
        self.apply(
            MethodOp::Mix,
            &[a.owned_by(self), b.owned_by(self), t.owned_by(self)],
        )
    }

    /// `if_true` where `cond` holds, else `if_false`.
    pub fn select<'g, K: Kind>(
        &'g self,
        cond: Node<'g, Boolean>,
        if_true: Node<'g, K>,
        if_false: Node<'g, K>,
    ) -> Node<'g, K> {
        self.apply(
            MethodOp::Select,
            &[
                if_false.owned_by(self),
                if_true.owned_by(self),
                cond.owned_by(self),
            ],
        )
    }

    /// Four-quadrant arctangent of `y / x`.
    pub fn atan2<'g>(&'g self, y: Node<'g, Float>, x: Node<'g, Float>) -> Node<'g, Float> {
        self.apply(MethodOp::Atan2, &[y.owned_by(self), x.owned_by(self)])
    }

    /// Lower the program producing `out` without executing it.
    ///
    /// # Panics
    /// If `out` belongs to another graph.
    pub fn compile<K: Renderable>(&self, out: Node<'_, K>) -> RasterProgram {
        let id = out.owned_by(self);
        lower(
            &self.state.instrs.borrow(),
            id,
            self.state.width,
            self.state.height,
        )
    }

    /// Compile and execute the program producing `out`, returning the RGBA8 target.
    ///
    /// Values are stored the way an `Rgba8Unorm` target stores them (clamped to `[0, 1]`).
    /// Scalars are replicated to RGB. A zero-sized target is returned without executing.
    ///
    /// # Panics
    /// If `out` belongs to another graph.
    pub fn render<K: Renderable>(&self, out: Node<'_, K>) -> DepthResult<PixelGrid> {
        let program = self.compile(out);
        if program.width == 0 || program.height == 0 {
            return PixelGrid::new(program.width, program.height, Vec::new());
        }
        let inputs = self.state.inputs.borrow();
        let bound: Vec<&PixelGrid> = program
            .inputs
            .iter()
            .map(|slot| inputs[*slot as usize].as_ref())
            .collect();
        tracing::debug!(
            graph = self.state.id,
            instrs = program.instruction_count(),
            inputs = bound.len(),
            fingerprint = program.fingerprint(),
            "render raster program"
        );
        self.backend.borrow_mut().execute(&program, &bound)
    }

    /// Unbind the graph, releasing its instructions and input references.
    pub fn purge(self) {
        tracing::trace!(graph = self.state.id, "purge shader graph");
    }

    fn construct<K: Kind>(&self, args: &[NodeId]) -> Node<'_, K> {
        self.state.node(Expr::Construct(SmallVec::from_slice(args)))
    }

    fn apply<K: Kind>(&self, op: MethodOp, args: &[NodeId]) -> Node<'_, K> {
        self.state.node(Expr::Apply {
            op: Operator::Method(op),
            args: SmallVec::from_slice(args),
        })
    }
}

/// A typed handle to a value in a [`ShaderGraph`].
///
/// Nodes are cheap to copy. Combining nodes from two different graphs panics.
pub struct Node<'g, K> {
    state: &'g GraphState,
    id: NodeId,
    _kind: PhantomData<K>,
}

impl<K> Clone for Node<'_, K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Node<'_, K> {}

impl<K> std::fmt::Debug for Node<'_, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("graph", &self.state.id)
            .field("id", &self.id)
            .finish()
    }
}

impl<'g, K: Kind> Node<'g, K> {
    /// Identifier (and symbolic name) of this node.
    pub fn id(self) -> NodeId {
        self.id
    }

    /// Symbolic name used in emitted source.
    pub fn name(self) -> String {
        self.id.name()
    }

    /// Runtime kind tag.
    pub fn value_type(self) -> ValueType {
        K::TYPE
    }

    fn owned_by(self, graph: &ShaderGraph<'_>) -> NodeId {
        graph.state.check_owned(self.state);
        self.id
    }

    fn derive<R: Kind>(self, op: Operator, rest: &[NodeId]) -> Node<'g, R> {
        let mut args = SmallVec::<[NodeId; 3]>::new();
        args.push(self.id);
        args.extend_from_slice(rest);
        self.state.node(Expr::Apply { op, args })
    }

    fn with<J: Kind, R: Kind>(self, op: Operator, other: Node<'g, J>) -> Node<'g, R> {
        self.state.check_owned(other.state);
        self.derive(op, &[other.id])
    }

    fn symbol<J: Kind, R: Kind>(self, op: SymbolOp, other: Node<'g, J>) -> Node<'g, R> {
        self.with(Operator::Symbol(op), other)
    }

    fn method<R: Kind>(self, op: MethodOp) -> Node<'g, R> {
        self.derive(Operator::Method(op), &[])
    }

    fn custom<R: Kind>(self, op: CustomOp) -> Node<'g, R> {
        self.derive(Operator::Custom(op), &[])
    }
}

impl<'g, K: Numeric> Node<'g, K> {
    /// Lane-wise minimum.
    pub fn minimum(self, other: Self) -> Self {
        self.with(Operator::Method(MethodOp::Min), other)
    }

    /// Lane-wise maximum.
    pub fn maximum(self, other: Self) -> Self {
        self.with(Operator::Method(MethodOp::Max), other)
    }

    /// Lane-wise clamp into `[lo, hi]`.
    pub fn clamp(self, lo: Self, hi: Self) -> Self {
        self.state.check_owned(lo.state);
        self.state.check_owned(hi.state);
        self.derive(Operator::Method(MethodOp::Clamp), &[lo.id, hi.id])
    }

    /// Lane-wise absolute value.
    pub fn abs(self) -> Self {
        self.method(MethodOp::Abs)
    }
}

impl<'g, K: FloatLike> Node<'g, K> {
    /// Lane-wise sine.
    pub fn sin(self) -> Self {
        self.method(MethodOp::Sin)
    }

    /// Lane-wise cosine.
    pub fn cos(self) -> Self {
        self.method(MethodOp::Cos)
    }

    /// Lane-wise tangent.
    pub fn tan(self) -> Self {
        self.method(MethodOp::Tan)
    }

    /// Lane-wise square root.
    pub fn sqrt(self) -> Self {
        self.method(MethodOp::Sqrt)
    }

    /// Lane-wise floor.
    pub fn floor(self) -> Self {
        self.method(MethodOp::Floor)
    }

    /// Lane-wise power.
    pub fn pow(self, exponent: Self) -> Self {
        self.with(Operator::Method(MethodOp::Pow), exponent)
    }
}

impl<'g, K: Scalar> Node<'g, K> {
    /// `self < other`.
    pub fn lt(self, other: Self) -> Node<'g, Boolean> {
        self.symbol(SymbolOp::Lt, other)
    }

    /// `self <= other`.
    pub fn le(self, other: Self) -> Node<'g, Boolean> {
        self.symbol(SymbolOp::Le, other)
    }

    /// `self > other`.
    pub fn gt(self, other: Self) -> Node<'g, Boolean> {
        self.symbol(SymbolOp::Gt, other)
    }

    /// `self >= other`.
    pub fn ge(self, other: Self) -> Node<'g, Boolean> {
        self.symbol(SymbolOp::Ge, other)
    }

    /// `self == other`.
    pub fn eq(self, other: Self) -> Node<'g, Boolean> {
        self.symbol(SymbolOp::Eq, other)
    }

    /// `self != other`.
    pub fn ne(self, other: Self) -> Node<'g, Boolean> {
        self.symbol(SymbolOp::Ne, other)
    }
}

impl<'g> Node<'g, Float> {
    /// Convert to an integer, truncating toward zero and saturating.
    pub fn to_integer(self) -> Node<'g, Integer> {
        self.custom(CustomOp::ToInteger)
    }
}

impl<'g> Node<'g, Integer> {
    /// Convert to a float.
    pub fn to_float(self) -> Node<'g, Float> {
        self.custom(CustomOp::ToFloat)
    }
}

impl<'g> Node<'g, Boolean> {
    /// Logical and.
    pub fn and(self, other: Self) -> Self {
        self.symbol(SymbolOp::And, other)
    }

    /// Logical or.
    pub fn or(self, other: Self) -> Self {
        self.symbol(SymbolOp::Or, other)
    }

    /// Logical not.
    pub fn not(self) -> Self {
        self.derive(Operator::Symbol(SymbolOp::Not), &[])
    }
}

impl<'g, K: VectorKind> Node<'g, K> {
    /// Euclidean length.
    pub fn length(self) -> Node<'g, Float> {
        self.method(MethodOp::Length)
    }

    /// Unit vector in the same direction.
    pub fn normalize(self) -> Self {
        self.method(MethodOp::Normalize)
    }

    /// Dot product.
    pub fn dot(self, other: Self) -> Node<'g, Float> {
        self.with(Operator::Method(MethodOp::Dot), other)
    }

    /// Select lane `index` (0 = x).
    ///
    /// # Panics
    /// If `index` is not a lane of this vector kind.
    pub fn channel(self, index: usize) -> Node<'g, Float> {
        assert!(
            index < K::DIMS,
            "channel {index} out of range for {}",
            K::TYPE.wgsl()
        );
        self.custom(CustomOp::Channel(index as u8))
    }

    /// First lane.
    pub fn x(self) -> Node<'g, Float> {
        self.channel(0)
    }

    /// Second lane.
    pub fn y(self) -> Node<'g, Float> {
        self.channel(1)
    }
}

impl<'g> Node<'g, Vector3> {
    /// Third lane.
    pub fn z(self) -> Node<'g, Float> {
        self.channel(2)
    }
}

impl<'g> Node<'g, Vector4> {
    /// Third lane.
    pub fn z(self) -> Node<'g, Float> {
        self.channel(2)
    }

    /// Fourth lane.
    pub fn w(self) -> Node<'g, Float> {
        self.channel(3)
    }

    /// First three lanes.
    pub fn xyz(self) -> Node<'g, Vector3> {
        self.custom(CustomOp::Xyz)
    }
}

impl<'g> Node<'g, Matrix3> {
    /// Matrix inverse. Singular matrices yield non-finite lanes.
    pub fn inverse(self) -> Self {
        self.custom(CustomOp::Inverse)
    }
}

macro_rules! same_kind_op {
    ($($trait:ident::$method:ident => $sym:ident),* $(,)?) => {
        $(
            impl<'g, K: Numeric> $trait for Node<'g, K> {
                type Output = Node<'g, K>;

                fn $method(self, rhs: Self) -> Self::Output {
                    self.symbol(SymbolOp::$sym, rhs)
                }
            }
        )*
    };
}

same_kind_op! {
    Add::add => Add,
    Sub::sub => Sub,
    Mul::mul => Mul,
    Div::div => Div,
}

impl<'g, K: VectorKind> Mul<Node<'g, Float>> for Node<'g, K> {
    type Output = Node<'g, K>;

    fn mul(self, rhs: Node<'g, Float>) -> Self::Output {
        self.symbol(SymbolOp::Mul, rhs)
    }
}

impl<'g, K: VectorKind> Div<Node<'g, Float>> for Node<'g, K> {
    type Output = Node<'g, K>;

    fn div(self, rhs: Node<'g, Float>) -> Self::Output {
        self.symbol(SymbolOp::Div, rhs)
    }
}

impl<'g, K: VectorKind> Mul<Node<'g, K>> for Node<'g, Float> {
    type Output = Node<'g, K>;

    fn mul(self, rhs: Node<'g, K>) -> Self::Output {
        self.symbol(SymbolOp::Mul, rhs)
    }
}

impl<'g> Mul for Node<'g, Matrix3> {
    type Output = Node<'g, Matrix3>;

    fn mul(self, rhs: Self) -> Self::Output {
        self.symbol(SymbolOp::Mul, rhs)
    }
}

impl<'g> Mul<Node<'g, Vector3>> for Node<'g, Matrix3> {
    type Output = Node<'g, Vector3>;

    fn mul(self, rhs: Node<'g, Vector3>) -> Self::Output {
        self.symbol(SymbolOp::Mul, rhs)
    }
}

impl<'g, K: Numeric> Neg for Node<'g, K> {
    type Output = Node<'g, K>;

    fn neg(self) -> Self::Output {
        self.derive(Operator::Symbol(SymbolOp::Neg), &[])
    }
}

#[cfg(test)]
#[path = "../../tests/unit/raster/graph.rs"]
mod tests;
