use std::fmt::Write as _;

use crate::raster::kind::ValueType;
use crate::raster::program::{CustomOp, Expr, Instr, Literal, MethodOp, NodeId, Operator, SymbolOp};

/// Fixed pass-through stage: one oversized triangle covering the whole target.
pub(crate) const VERTEX_STAGE: &str = r#"@vertex
fn vs(@builtin(vertex_index) vi: u32) -> @builtin(position) vec4<f32> {
  var p = array<vec2<f32>, 3>(
    vec2<f32>(-1.0, -1.0),
    vec2<f32>( 3.0, -1.0),
    vec2<f32>(-1.0,  3.0),
  );
  return vec4<f32>(p[vi], 0.0, 1.0);
}
"#;

const INVERSE3_HELPER: &str = r#"fn inverse3(m: mat3x3<f32>) -> mat3x3<f32> {
  let r0 = cross(m[1], m[2]);
  let r1 = cross(m[2], m[0]);
  let r2 = cross(m[0], m[1]);
  let det = dot(m[0], r0);
  return transpose(mat3x3<f32>(r0, r1, r2)) * (1.0 / det);
}
"#;

pub(crate) fn emit_fragment(
    instrs: &[Instr],
    input_count: usize,
    output: NodeId,
    output_ty: ValueType,
    width: u32,
    height: u32,
) -> String {
    let mut src = String::with_capacity(256 + instrs.len() * 48);

    for binding in 0..input_count {
        let _ = writeln!(
            src,
            "@group(0) @binding({binding}) var t_in{binding}: texture_2d<f32>;"
        );
    }
    if input_count > 0 {
        src.push('\n');
    }

    let needs_inverse = instrs.iter().any(|i| {
        matches!(
            i.expr,
            Expr::Apply {
                op: Operator::Custom(CustomOp::Inverse),
                ..
            }
        )
    });
    if needs_inverse {
        src.push_str(INVERSE3_HELPER);
        src.push('\n');
    }

    src.push_str("@fragment\nfn fs(@builtin(position) frag: vec4<f32>) -> @location(0) vec4<f32> {\n");
    src.push_str("  let px = vec2<i32>(floor(frag.xy));\n");
    for instr in instrs {
        let _ = writeln!(
            src,
            "  let {}: {} = {};",
            instr.id.name(),
            instr.ty.wgsl(),
            emit_expr(instr, width, height)
        );
    }
    let _ = writeln!(src, "  return {};", promote_rgba(&output.name(), output_ty));
    src.push_str("}\n");
    src
}

fn emit_expr(instr: &Instr, width: u32, height: u32) -> String {
    match &instr.expr {
        Expr::Literal(lit) => literal(*lit),
        Expr::Input(binding) => format!("textureLoad(t_in{binding}, px, 0)"),
        Expr::FragCoord => "frag.xy".to_string(),
        Expr::Resolution => format!("vec2<f32>({}, {})", float(width as f32), float(height as f32)),
        Expr::Construct(args) => format!("{}({})", instr.ty.wgsl(), names(args)),
        Expr::Apply { op, args } => {
            let a = |i: usize| args[i].name();
            match op {
                Operator::Symbol(sym) => match sym {
                    SymbolOp::Neg => format!("(-{})", a(0)),
                    SymbolOp::Not => format!("(!{})", a(0)),
                    _ => format!("({} {} {})", a(0), infix(*sym), a(1)),
                },
                Operator::Method(m) => format!("{}({})", method_name(*m), names(args)),
                Operator::Custom(c) => match c {
                    CustomOp::Channel(i) => format!("{}.{}", a(0), ["x", "y", "z", "w"][*i as usize]),
                    CustomOp::Xyz => format!("{}.xyz", a(0)),
                    CustomOp::Inverse => format!("inverse3({})", a(0)),
                    CustomOp::ToFloat => format!("f32({})", a(0)),
                    CustomOp::ToInteger => format!("i32({})", a(0)),
                },
            }
        }
    }
}

fn infix(op: SymbolOp) -> &'static str {
    match op {
        SymbolOp::Add => "+",
        SymbolOp::Sub => "-",
        SymbolOp::Mul => "*",
        SymbolOp::Div => "/",
        SymbolOp::Lt => "<",
        SymbolOp::Le => "<=",
        SymbolOp::Gt => ">",
        SymbolOp::Ge => ">=",
        SymbolOp::Eq => "==",
        SymbolOp::Ne => "!=",
        SymbolOp::And => "&&",
        SymbolOp::Or => "||",
        SymbolOp::Neg => "-",
        SymbolOp::Not => "!",
    }
}

fn method_name(op: MethodOp) -> &'static str {
    match op {
        MethodOp::Sin => "sin",
        MethodOp::Cos => "cos",
        MethodOp::Tan => "tan",
        MethodOp::Atan2 => "atan2",
        MethodOp::Sqrt => "sqrt",
        MethodOp::Abs => "abs",
        MethodOp::Pow => "pow",
        MethodOp::Floor => "floor",
        MethodOp::Length => "length",
        MethodOp::Normalize => "normalize",
        MethodOp::Dot => "dot",
        MethodOp::Min => "min",
        MethodOp::Max => "max",
        MethodOp::Clamp => "clamp",
        MethodOp::Mix => "mix",
        MethodOp::Step => "step",
        MethodOp::Select => "select",
    }
}

fn names(args: &[NodeId]) -> String {
    args.iter()
        .map(|a| a.name())
        .collect::<Vec<_>>()
        .join(", ")
}

fn literal(lit: Literal) -> String {
    match lit {
        Literal::Float(v) => float(v),
        Literal::Integer(v) => format!("{v}i"),
        Literal::Boolean(v) => v.to_string(),
    }
}

// `{:?}` keeps a decimal point or exponent, which WGSL needs to type the literal as f32.
fn float(v: f32) -> String {
    format!("{v:?}")
}

fn promote_rgba(name: &str, ty: ValueType) -> String {
    match ty {
        ValueType::Float => format!("vec4<f32>({name}, {name}, {name}, 1.0)"),
        ValueType::Integer => format!("vec4<f32>(vec3<f32>(f32({name})), 1.0)"),
        ValueType::Boolean => format!("vec4<f32>(vec3<f32>(select(0.0, 1.0, {name})), 1.0)"),
        ValueType::Vector2 => format!("vec4<f32>({name}, 0.0, 1.0)"),
        ValueType::Vector3 => format!("vec4<f32>({name}, 1.0)"),
        ValueType::Vector4 => name.to_string(),
        // `Renderable` is not implemented for matrices.
        ValueType::Matrix3 => unreachable!("matrix values are not renderable"),
    }
}
