//! glam vector/matrix types.
//!
//! The registry describes these as ordinary structs (`x`, `y`, `z`, or
//! `x_axis`, `y_axis`, …), but serde writes them as flat arrays. Anything in
//! this catalogue bypasses the struct path in the compiler.
use crate::form::{Constraints, FormNode, Primitive};

const VEC2: &[&str] = &["x", "y"];
const VEC3: &[&str] = &["x", "y", "z"];
const VEC4: &[&str] = &["x", "y", "z", "w"];

/// Axis layout, in serialization order, for a catalogued type path.
pub fn axis_fields(type_path: &str) -> Option<Vec<String>> {
    let name = type_path.strip_prefix("glam::")?;
    let fields = match name {
        "Vec2" | "DVec2" | "I8Vec2" | "U8Vec2" | "I16Vec2" | "U16Vec2" | "IVec2" | "UVec2"
        | "I64Vec2" | "U64Vec2" | "BVec2" => plain(VEC2),
        "Vec3" | "Vec3A" | "DVec3" | "I8Vec3" | "U8Vec3" | "I16Vec3" | "U16Vec3" | "IVec3"
        | "UVec3" | "I64Vec3" | "U64Vec3" | "BVec3" | "BVec3A" => plain(VEC3),
        "Vec4" | "DVec4" | "I8Vec4" | "U8Vec4" | "I16Vec4" | "U16Vec4" | "IVec4" | "UVec4"
        | "I64Vec4" | "U64Vec4" | "BVec4" | "BVec4A" => plain(VEC4),
        "Quat" | "DQuat" => plain(VEC4),
        "Mat2" | "DMat2" => columns(&["x_axis", "y_axis"], VEC2),
        "Mat3" | "Mat3A" | "DMat3" => columns(&["x_axis", "y_axis", "z_axis"], VEC3),
        "Mat4" | "DMat4" => columns(&["x_axis", "y_axis", "z_axis", "w_axis"], VEC4),
        "Affine2" | "DAffine2" => {
            let mut fields = columns(&["matrix2.x_axis", "matrix2.y_axis"], VEC2);
            fields.extend(columns(&["translation"], VEC2));
            fields
        }
        "Affine3A" | "DAffine3" => {
            let mut fields = columns(&["matrix3.x_axis", "matrix3.y_axis", "matrix3.z_axis"], VEC3);
            fields.extend(columns(&["translation"], VEC3));
            fields
        }
        _ => return None,
    };
    Some(fields)
}

/// Element type implied by the glam naming scheme.
fn element(name: &str) -> (Primitive, Constraints) {
    let int = |min: i128, max: i128| (Primitive::Int, Constraints::range(min, max));
    let uint = |max: i128| (Primitive::UInt, Constraints::range(0, max));
    match name {
        n if n.starts_with("BVec") => (Primitive::Bool, Constraints::NONE),
        n if n.starts_with("I8") => int(i8::MIN.into(), i8::MAX.into()),
        n if n.starts_with("U8") => uint(u8::MAX.into()),
        n if n.starts_with("I16") => int(i16::MIN.into(), i16::MAX.into()),
        n if n.starts_with("U16") => uint(u16::MAX.into()),
        n if n.starts_with("I64") => (Primitive::Int, Constraints::NONE),
        n if n.starts_with("U64") => (Primitive::UInt, Constraints::at_least(0)),
        n if n.starts_with("IVec") => int(i32::MIN.into(), i32::MAX.into()),
        n if n.starts_with("UVec") => uint(u32::MAX.into()),
        _ => (Primitive::Float, Constraints::NONE),
    }
}

pub fn vector_override(type_path: &str) -> Option<FormNode> {
    let axis_fields = axis_fields(type_path)?;
    let (element, constraints) = element(type_path.strip_prefix("glam::")?);
    Some(FormNode::VectorOverride {
        type_path: type_path.to_string(),
        axis_fields,
        element,
        constraints,
    })
}

fn plain(axes: &[&str]) -> Vec<String> {
    axes.iter().map(|a| a.to_string()).collect()
}

fn columns(prefixes: &[&str], axes: &[&str]) -> Vec<String> {
    prefixes
        .iter()
        .flat_map(|prefix| axes.iter().map(move |axis| format!("{prefix}.{axis}")))
        .collect()
}
