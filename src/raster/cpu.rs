use rayon::prelude::*;

use crate::foundation::error::{DepthError, DepthResult};
use crate::foundation::grid::{CHANNELS, PixelGrid};
use crate::foundation::math::unorm8;
use crate::raster::backend::{BackendKind, RasterBackend};
use crate::raster::kind::ValueType;
use crate::raster::program::{
    CustomOp, Expr, Instr, Literal, MethodOp, NodeId, Operator, RasterProgram, SymbolOp,
};

/// Register value of the interpreter. Matrices are column-major.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Value {
    Float(f32),
    Integer(i32),
    Boolean(bool),
    Vector2([f32; 2]),
    Vector3([f32; 3]),
    Vector4([f32; 4]),
    Matrix3([[f32; 3]; 3]),
}

impl Value {
    fn zero(ty: ValueType) -> Self {
        match ty {
            ValueType::Float => Self::Float(0.0),
            ValueType::Integer => Self::Integer(0),
            ValueType::Boolean => Self::Boolean(false),
            ValueType::Vector2 => Self::Vector2([0.0; 2]),
            ValueType::Vector3 => Self::Vector3([0.0; 3]),
            ValueType::Vector4 => Self::Vector4([0.0; 4]),
            ValueType::Matrix3 => Self::Matrix3([[0.0; 3]; 3]),
        }
    }

    fn lanes(self) -> Option<Lanes> {
        let mut v = [0.0; 4];
        let n = match self {
            Self::Float(x) => {
                v[0] = x;
                1
            }
            Self::Vector2(a) => {
                v[..2].copy_from_slice(&a);
                2
            }
            Self::Vector3(a) => {
                v[..3].copy_from_slice(&a);
                3
            }
            Self::Vector4(a) => {
                v = a;
                4
            }
            Self::Integer(_) | Self::Boolean(_) | Self::Matrix3(_) => return None,
        };
        Some(Lanes { v, n })
    }

    fn as_f32(self) -> Result<f32, String> {
        match self {
            Self::Float(v) => Ok(v),
            other => Err(format!("expected f32, found {other:?}")),
        }
    }

    fn as_bool(self) -> Result<bool, String> {
        match self {
            Self::Boolean(v) => Ok(v),
            other => Err(format!("expected bool, found {other:?}")),
        }
    }

    fn float_lanes(self) -> Result<Lanes, String> {
        self.lanes()
            .ok_or_else(|| format!("expected float lanes, found {self:?}"))
    }

    fn rgba(self) -> Result<[f32; 4], String> {
        Ok(match self {
            Self::Float(v) => [v, v, v, 1.0],
            Self::Integer(i) => {
                let v = i as f32;
                [v, v, v, 1.0]
            }
            Self::Boolean(b) => {
                let v = if b { 1.0 } else { 0.0 };
                [v, v, v, 1.0]
            }
            Self::Vector2([x, y]) => [x, y, 0.0, 1.0],
            Self::Vector3([x, y, z]) => [x, y, z, 1.0],
            Self::Vector4(v) => v,
            Self::Matrix3(_) => return Err("matrix values are not renderable".to_string()),
        })
    }
}

/// Float lanes of a scalar or vector, with the lane count.
#[derive(Clone, Copy, Debug)]
struct Lanes {
    v: [f32; 4],
    n: usize,
}

impl Lanes {
    fn lane(&self, i: usize) -> f32 {
        // Scalars broadcast.
        if self.n == 1 { self.v[0] } else { self.v[i] }
    }

    fn map(self, f: impl Fn(f32) -> f32) -> Value {
        let mut out = self;
        for i in 0..self.n {
            out.v[i] = f(self.v[i]);
        }
        out.into_value()
    }

    fn zip(a: Lanes, b: Lanes, f: impl Fn(f32, f32) -> f32) -> Result<Value, String> {
        let n = a.n.max(b.n);
        if a.n != b.n && a.n != 1 && b.n != 1 {
            return Err(format!("lane count mismatch: {} vs {}", a.n, b.n));
        }
        let mut v = [0.0; 4];
        for (i, slot) in v.iter_mut().enumerate().take(n) {
            *slot = f(a.lane(i), b.lane(i));
        }
        Ok(Lanes { v, n }.into_value())
    }

    fn zip3(
        a: Lanes,
        b: Lanes,
        c: Lanes,
        f: impl Fn(f32, f32, f32) -> f32,
    ) -> Result<Value, String> {
        let n = a.n.max(b.n).max(c.n);
        if [a.n, b.n, c.n].iter().any(|m| *m != n && *m != 1) {
            return Err(format!("lane count mismatch: {} / {} / {}", a.n, b.n, c.n));
        }
        let mut v = [0.0; 4];
        for (i, slot) in v.iter_mut().enumerate().take(n) {
            *slot = f(a.lane(i), b.lane(i), c.lane(i));
        }
        Ok(Lanes { v, n }.into_value())
    }

    fn dot(a: Lanes, b: Lanes) -> f32 {
        (0..a.n.max(b.n)).map(|i| a.lane(i) * b.lane(i)).sum()
    }

    fn into_value(self) -> Value {
        let v = self.v;
        match self.n {
            1 => Value::Float(v[0]),
            2 => Value::Vector2([v[0], v[1]]),
            3 => Value::Vector3([v[0], v[1], v[2]]),
            _ => Value::Vector4(v),
        }
    }
}

/// Interpreter backend: evaluates the lowered program per pixel on the rayon pool.
///
/// Arithmetic follows WGSL: integer ops wrap, integer division by zero yields the dividend,
/// and the output is quantized like an `Rgba8Unorm` target.
#[derive(Debug, Default)]
pub struct CpuBackend;

impl CpuBackend {
    /// Create the backend. Work runs on the ambient rayon pool.
    pub fn new() -> Self {
        Self
    }
}

impl RasterBackend for CpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cpu
    }

    #[tracing::instrument(skip_all, fields(w = program.width(), h = program.height()))]
    fn execute(
        &mut self,
        program: &RasterProgram,
        inputs: &[&PixelGrid],
    ) -> DepthResult<PixelGrid> {
        let (width, height) = (program.width(), program.height());
        if inputs.len() != program.input_count() {
            return Err(DepthError::validation(format!(
                "program samples {} inputs, {} bound",
                program.input_count(),
                inputs.len()
            )));
        }
        if let Some(bad) = inputs
            .iter()
            .find(|g| g.width() != width || g.height() != height)
        {
            return Err(DepthError::validation(format!(
                "input is {}x{}, raster target is {width}x{height}",
                bad.width(),
                bad.height()
            )));
        }
        if width == 0 || height == 0 {
            return PixelGrid::new(width, height, Vec::new());
        }

        let regs = RegisterMap::new(&program.instrs);
        let output = regs.slot(program.output);
        let row_bytes = width as usize * CHANNELS;
        let mut data = vec![0u8; row_bytes * height as usize];

        data.par_chunks_mut(row_bytes)
            .enumerate()
            .try_for_each_init(
                || {
                    program
                        .instrs
                        .iter()
                        .map(|i| Value::zero(i.ty))
                        .collect::<Vec<_>>()
                },
                |scratch, (y, row)| -> Result<(), String> {
                    for (x, px) in row.chunks_exact_mut(CHANNELS).enumerate() {
                        let ctx = Fragment {
                            x: x as u32,
                            y: y as u32,
                            width,
                            height,
                            inputs,
                        };
                        for (k, instr) in program.instrs.iter().enumerate() {
                            let v = eval(instr, &regs, scratch.as_slice(), &ctx)?;
                            scratch[k] = v;
                        }
                        let rgba = scratch[output].rgba()?;
                        for (dst, v) in px.iter_mut().zip(rgba) {
                            *dst = unorm8(v);
                        }
                    }
                    Ok(())
                },
            )
            .map_err(DepthError::evaluation)?;

        PixelGrid::new(width, height, data)
    }
}

/// Maps sparse node ids onto dense register slots.
struct RegisterMap {
    slots: Vec<usize>,
}

impl RegisterMap {
    fn new(instrs: &[Instr]) -> Self {
        let len = instrs.last().map_or(0, |i| i.id.index() + 1);
        let mut slots = vec![usize::MAX; len];
        for (k, instr) in instrs.iter().enumerate() {
            slots[instr.id.index()] = k;
        }
        Self { slots }
    }

    fn slot(&self, id: NodeId) -> usize {
        self.slots[id.index()]
    }
}

struct Fragment<'a> {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    inputs: &'a [&'a PixelGrid],
}

fn eval(
    instr: &Instr,
    regs: &RegisterMap,
    scratch: &[Value],
    frag: &Fragment<'_>,
) -> Result<Value, String> {
    let arg = |id: &NodeId| scratch[regs.slot(*id)];
    Ok(match &instr.expr {
        Expr::Literal(Literal::Float(v)) => Value::Float(*v),
        Expr::Literal(Literal::Integer(v)) => Value::Integer(*v),
        Expr::Literal(Literal::Boolean(v)) => Value::Boolean(*v),
        Expr::Input(binding) => {
            let grid = frag
                .inputs
                .get(*binding as usize)
                .ok_or_else(|| format!("unbound input {binding}"))?;
            let p = grid.pixel(frag.x, frag.y).unwrap_or([0; 4]);
            Value::Vector4(p.map(|c| f32::from(c) / 255.0))
        }
        Expr::FragCoord => Value::Vector2([frag.x as f32 + 0.5, frag.y as f32 + 0.5]),
        Expr::Resolution => Value::Vector2([frag.width as f32, frag.height as f32]),
        Expr::Construct(args) => construct(instr.ty, args.iter().map(arg))?,
        Expr::Apply { op, args } => {
            let vals: smallvec::SmallVec<[Value; 3]> = args.iter().map(arg).collect();
            match op {
                Operator::Symbol(sym) => symbol(*sym, &vals)?,
                Operator::Method(m) => method(*m, &vals)?,
                Operator::Custom(c) => custom(*c, vals[0])?,
            }
        }
    })
}

fn construct(ty: ValueType, args: impl Iterator<Item = Value>) -> Result<Value, String> {
    if ty == ValueType::Matrix3 {
        let mut m = [[0.0; 3]; 3];
        for (col, v) in m.iter_mut().zip(args) {
            match v {
                Value::Vector3(c) => *col = c,
                other => return Err(format!("matrix column must be vec3, found {other:?}")),
            }
        }
        return Ok(Value::Matrix3(m));
    }
    let mut v = [0.0; 4];
    let mut n = 0;
    for a in args {
        let lanes = a.float_lanes()?;
        for i in 0..lanes.n {
            if n >= 4 {
                return Err("too many constructor lanes".to_string());
            }
            v[n] = lanes.v[i];
            n += 1;
        }
    }
    if n != ty.lanes() {
        return Err(format!("{} built from {n} lanes", ty.wgsl()));
    }
    Ok(Lanes { v, n }.into_value())
}

fn symbol(op: SymbolOp, a: &[Value]) -> Result<Value, String> {
    match op {
        SymbolOp::Neg => Ok(match a[0] {
            Value::Integer(i) => Value::Integer(i.wrapping_neg()),
            other => other.float_lanes()?.map(|x| -x),
        }),
        SymbolOp::Not => Ok(Value::Boolean(!a[0].as_bool()?)),
        SymbolOp::And => Ok(Value::Boolean(a[0].as_bool()? && a[1].as_bool()?)),
        SymbolOp::Or => Ok(Value::Boolean(a[0].as_bool()? || a[1].as_bool()?)),
        SymbolOp::Lt | SymbolOp::Le | SymbolOp::Gt | SymbolOp::Ge | SymbolOp::Eq | SymbolOp::Ne => {
            let ord = match (a[0], a[1]) {
                (Value::Integer(x), Value::Integer(y)) => x.partial_cmp(&y),
                (Value::Float(x), Value::Float(y)) => x.partial_cmp(&y),
                (x, y) => return Err(format!("cannot compare {x:?} with {y:?}")),
            };
            use std::cmp::Ordering::*;
            Ok(Value::Boolean(match op {
                SymbolOp::Lt => ord == Some(Less),
                SymbolOp::Le => matches!(ord, Some(Less | Equal)),
                SymbolOp::Gt => ord == Some(Greater),
                SymbolOp::Ge => matches!(ord, Some(Greater | Equal)),
                SymbolOp::Eq => ord == Some(Equal),
                _ => ord != Some(Equal),
            }))
        }
        SymbolOp::Add | SymbolOp::Sub | SymbolOp::Mul | SymbolOp::Div => arith(op, a[0], a[1]),
    }
}

fn arith(op: SymbolOp, a: Value, b: Value) -> Result<Value, String> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Ok(Value::Integer(match op {
            SymbolOp::Add => x.wrapping_add(y),
            SymbolOp::Sub => x.wrapping_sub(y),
            SymbolOp::Mul => x.wrapping_mul(y),
            _ => x.checked_div(y).unwrap_or(x),
        })),
        (Value::Matrix3(m), Value::Matrix3(n)) if op == SymbolOp::Mul => {
            Ok(Value::Matrix3(n.map(|col| mat_vec(&m, col))))
        }
        (Value::Matrix3(m), Value::Vector3(v)) if op == SymbolOp::Mul => {
            Ok(Value::Vector3(mat_vec(&m, v)))
        }
        (x, y) => {
            let f: fn(f32, f32) -> f32 = match op {
                SymbolOp::Add => |p, q| p + q,
                SymbolOp::Sub => |p, q| p - q,
                SymbolOp::Mul => |p, q| p * q,
                _ => |p, q| p / q,
            };
            Lanes::zip(x.float_lanes()?, y.float_lanes()?, f)
        }
    }
}

fn mat_vec(m: &[[f32; 3]; 3], v: [f32; 3]) -> [f32; 3] {
    let mut out = [0.0; 3];
    for (c, col) in m.iter().enumerate() {
        for (r, o) in out.iter_mut().enumerate() {
            *o += col[r] * v[c];
        }
    }
    out
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn inverse3(m: [[f32; 3]; 3]) -> [[f32; 3]; 3] {
    let r = [cross(m[1], m[2]), cross(m[2], m[0]), cross(m[0], m[1])];
    let det: f32 = (0..3).map(|i| m[0][i] * r[0][i]).sum();
    let inv = 1.0 / det;
    let mut out = [[0.0; 3]; 3];
    for (c, col) in out.iter_mut().enumerate() {
        for (k, v) in col.iter_mut().enumerate() {
            *v = r[k][c] * inv;
        }
    }
    out
}

fn method(op: MethodOp, a: &[Value]) -> Result<Value, String> {
    match op {
        MethodOp::Sin => Ok(a[0].float_lanes()?.map(f32::sin)),
        MethodOp::Cos => Ok(a[0].float_lanes()?.map(f32::cos)),
        MethodOp::Tan => Ok(a[0].float_lanes()?.map(f32::tan)),
        MethodOp::Sqrt => Ok(a[0].float_lanes()?.map(f32::sqrt)),
        MethodOp::Floor => Ok(a[0].float_lanes()?.map(f32::floor)),
        MethodOp::Abs => match a[0] {
            Value::Integer(i) => Ok(Value::Integer(i.wrapping_abs())),
            v => Ok(v.float_lanes()?.map(f32::abs)),
        },
        MethodOp::Atan2 => Lanes::zip(a[0].float_lanes()?, a[1].float_lanes()?, f32::atan2),
        MethodOp::Pow => Lanes::zip(a[0].float_lanes()?, a[1].float_lanes()?, f32::powf),
        MethodOp::Length => {
            let l = a[0].float_lanes()?;
            Ok(Value::Float(Lanes::dot(l, l).sqrt()))
        }
        MethodOp::Normalize => {
            let l = a[0].float_lanes()?;
            let len = Lanes::dot(l, l).sqrt();
            Ok(l.map(|x| x / len))
        }
        MethodOp::Dot => Ok(Value::Float(Lanes::dot(
            a[0].float_lanes()?,
            a[1].float_lanes()?,
        ))),
        MethodOp::Min | MethodOp::Max => match (a[0], a[1]) {
            (Value::Integer(x), Value::Integer(y)) => Ok(Value::Integer(if op == MethodOp::Min {
                x.min(y)
            } else {
                x.max(y)
            })),
            (x, y) => {
                let f: fn(f32, f32) -> f32 = if op == MethodOp::Min { f32::min } else { f32::max };
                Lanes::zip(x.float_lanes()?, y.float_lanes()?, f)
            }
        },
        MethodOp::Clamp => match (a[0], a[1], a[2]) {
            (Value::Integer(x), Value::Integer(lo), Value::Integer(hi)) => {
                Ok(Value::Integer(x.max(lo).min(hi)))
            }
            (x, lo, hi) => Lanes::zip3(
                x.float_lanes()?,
                lo.float_lanes()?,
                hi.float_lanes()?,
                |v, l, h| v.max(l).min(h),
            ),
        },
        MethodOp::Mix => Lanes::zip3(
            a[0].float_lanes()?,
            a[1].float_lanes()?,
            a[2].float_lanes()?,
            |x, y, t| x * (1.0 - t) + y * t,
        ),
        MethodOp::Step => Lanes::zip(a[0].float_lanes()?, a[1].float_lanes()?, |edge, x| {
            if edge <= x { 1.0 } else { 0.0 }
        }),
        MethodOp::Select => Ok(if a[2].as_bool()? { a[1] } else { a[0] }),
    }
}

fn custom(op: CustomOp, a: Value) -> Result<Value, String> {
    match op {
        CustomOp::Channel(i) => {
            let l = a.float_lanes()?;
            if usize::from(i) >= l.n {
                return Err(format!("channel {i} out of range for {a:?}"));
            }
            Ok(Value::Float(l.v[usize::from(i)]))
        }
        CustomOp::Xyz => match a {
            Value::Vector4([x, y, z, _]) => Ok(Value::Vector3([x, y, z])),
            other => Err(format!("xyz of {other:?}")),
        },
        CustomOp::Inverse => match a {
            Value::Matrix3(m) => Ok(Value::Matrix3(inverse3(m))),
            other => Err(format!("inverse of {other:?}")),
        },
        CustomOp::ToFloat => match a {
            Value::Integer(i) => Ok(Value::Float(i as f32)),
            other => Err(format!("f32() of {other:?}")),
        },
        // `as` saturates and maps NaN to 0.
        CustomOp::ToInteger => Ok(Value::Integer(a.as_f32()? as i32)),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/raster/cpu.rs"]
mod tests;
