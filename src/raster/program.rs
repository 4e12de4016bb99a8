use smallvec::SmallVec;

use crate::foundation::math::Fnv1a64;
use crate::raster::kind::ValueType;
use crate::raster::wgsl;

/// Identifier of a node within one shader graph. Also its symbolic name (`v{id}`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Symbolic name used in emitted source.
    pub fn name(self) -> String {
        format!("v{}", self.0)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Literal {
    Float(f32),
    Integer(i32),
    Boolean(bool),
}

/// Operators rendered as infix/prefix symbols.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SymbolOp {
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    Not,
}

/// Operators rendered as builtin calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MethodOp {
    Sin,
    Cos,
    Tan,
    Atan2,
    Sqrt,
    Abs,
    Pow,
    Floor,
    Length,
    Normalize,
    Dot,
    Min,
    Max,
    Clamp,
    Mix,
    Step,
    // args: [if_false, if_true, cond]
    Select,
}

/// Operators with bespoke lowering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CustomOp {
    Channel(u8),
    Xyz,
    Inverse,
    ToFloat,
    ToInteger,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Operator {
    Symbol(SymbolOp),
    Method(MethodOp),
    Custom(CustomOp),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Expr {
    Literal(Literal),
    /// Texel of a bound input at the current fragment.
    Input(u32),
    /// Pixel-center coordinate of the current fragment.
    FragCoord,
    /// Raster target size in pixels.
    Resolution,
    /// Vector or matrix constructor of the instruction's own type.
    Construct(SmallVec<[NodeId; 4]>),
    Apply {
        op: Operator,
        args: SmallVec<[NodeId; 3]>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Instr {
    pub(crate) id: NodeId,
    pub(crate) ty: ValueType,
    pub(crate) expr: Expr,
}

impl Instr {
    pub(crate) fn operands(&self) -> &[NodeId] {
        match &self.expr {
            Expr::Construct(args) => args,
            Expr::Apply { args, .. } => args,
            Expr::Literal(_) | Expr::Input(_) | Expr::FragCoord | Expr::Resolution => &[],
        }
    }
}

/// A lowered raster program: a fixed full-screen vertex stage plus a per-pixel fragment stage.
///
/// Produced by [`ShaderGraph::compile`](crate::ShaderGraph::compile) and executed by a
/// [`RasterBackend`](crate::RasterBackend).
#[derive(Clone, Debug)]
pub struct RasterProgram {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) instrs: Vec<Instr>,
    pub(crate) output: NodeId,
    /// Graph input slots, in binding order.
    pub(crate) inputs: Vec<u32>,
    vertex_source: String,
    fragment_source: String,
    fingerprint: u64,
}

impl RasterProgram {
    /// Raster target width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Raster target height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// WGSL source of the vertex stage.
    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    /// WGSL source of the fragment stage.
    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    /// Stable hash of both stages, used as a pipeline cache key.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Number of instructions kept after dead-code elimination.
    pub fn instruction_count(&self) -> usize {
        self.instrs.len()
    }

    /// Number of input textures the program samples.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }
}

/// Lower the recorded instructions into a program producing `output`.
///
/// Only instructions reachable from `output` are kept, in creation order. Input slots are
/// renumbered densely in first-use order.
pub(crate) fn lower(
    instrs: &[Instr],
    output: NodeId,
    width: u32,
    height: u32,
) -> RasterProgram {
    let mut live = vec![false; instrs.len()];
    live[output.index()] = true;
    for instr in instrs[..=output.index()].iter().rev() {
        if !live[instr.id.index()] {
            continue;
        }
        for arg in instr.operands() {
            live[arg.index()] = true;
        }
    }

    let mut inputs = Vec::<u32>::new();
    let mut kept = Vec::with_capacity(live.iter().filter(|l| **l).count());
    for instr in instrs.iter().filter(|i| live[i.id.index()]) {
        let mut instr = instr.clone();
        if let Expr::Input(slot) = instr.expr {
            let binding = match inputs.iter().position(|s| *s == slot) {
                Some(b) => b,
                None => {
                    inputs.push(slot);
                    inputs.len() - 1
                }
            };
            instr.expr = Expr::Input(binding as u32);
        }
        kept.push(instr);
    }

    let output_ty = instrs[output.index()].ty;
    let vertex_source = wgsl::VERTEX_STAGE.to_string();
    let fragment_source = wgsl::emit_fragment(&kept, inputs.len(), output, output_ty, width, height);

    let mut h = Fnv1a64::new_default();
    h.write_bytes(vertex_source.as_bytes());
    h.write_bytes(fragment_source.as_bytes());
    h.write_u32(inputs.len() as u32);

    RasterProgram {
        width,
        height,
        instrs: kept,
        output,
        inputs,
        vertex_source,
        fragment_source,
        fingerprint: h.finish(),
    }
}
