//! Type and descriptor algebra.
//!
//! Pure mappings between type descriptors, boxed wrapper types, stack-slot
//! widths and the load/return opcodes appropriate to each type. Everything
//! the transformer knows about descriptors lives here.

use crate::model::opcode;
use anyhow::{Result, bail};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JavaType {
    Void,
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// Internal name, e.g. `java/lang/String`.
    Object(String),
    /// Full array descriptor, e.g. `[I` or `[Ljava/lang/String;`.
    Array(String),
}

impl JavaType {
    pub fn parse(desc: &str) -> Result<JavaType> {
        let (t, rest) = take_type(desc)?;
        if !rest.is_empty() {
            bail!("trailing characters in type descriptor: {desc}");
        }
        Ok(t)
    }

    pub fn descriptor(&self) -> String {
        match self {
            JavaType::Void => "V".to_string(),
            JavaType::Boolean => "Z".to_string(),
            JavaType::Byte => "B".to_string(),
            JavaType::Char => "C".to_string(),
            JavaType::Short => "S".to_string(),
            JavaType::Int => "I".to_string(),
            JavaType::Long => "J".to_string(),
            JavaType::Float => "F".to_string(),
            JavaType::Double => "D".to_string(),
            JavaType::Object(name) => format!("L{name};"),
            JavaType::Array(desc) => desc.clone(),
        }
    }

    /// Name usable as a type-instruction operand. For arrays this is the
    /// descriptor itself, matching the binary format's CHECKCAST convention.
    pub fn internal_name(&self) -> Result<&str> {
        match self {
            JavaType::Object(name) => Ok(name),
            JavaType::Array(desc) => Ok(desc),
            other => bail!("type {other:?} has no internal name"),
        }
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            JavaType::Void | JavaType::Object(_) | JavaType::Array(_)
        )
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, JavaType::Object(_) | JavaType::Array(_))
    }

    /// Stack-slot width: two for long/double, zero for void, one otherwise.
    pub fn slot_width(&self) -> u16 {
        match self {
            JavaType::Void => 0,
            JavaType::Long | JavaType::Double => 2,
            _ => 1,
        }
    }

    pub fn load_opcode(&self) -> u8 {
        match self {
            JavaType::Long => opcode::LLOAD,
            JavaType::Float => opcode::FLOAD,
            JavaType::Double => opcode::DLOAD,
            JavaType::Object(_) | JavaType::Array(_) => opcode::ALOAD,
            // int-like; void never occurs in argument position
            _ => opcode::ILOAD,
        }
    }

    pub fn return_opcode(&self) -> u8 {
        match self {
            JavaType::Void => opcode::RETURN,
            JavaType::Long => opcode::LRETURN,
            JavaType::Float => opcode::FRETURN,
            JavaType::Double => opcode::DRETURN,
            JavaType::Object(_) | JavaType::Array(_) => opcode::ARETURN,
            _ => opcode::IRETURN,
        }
    }

    /// Internal name of the boxed wrapper for a primitive type.
    pub fn boxed_internal_name(&self) -> Option<&'static str> {
        match self {
            JavaType::Boolean => Some("java/lang/Boolean"),
            JavaType::Byte => Some("java/lang/Byte"),
            JavaType::Char => Some("java/lang/Character"),
            JavaType::Short => Some("java/lang/Short"),
            JavaType::Int => Some("java/lang/Integer"),
            JavaType::Long => Some("java/lang/Long"),
            JavaType::Float => Some("java/lang/Float"),
            JavaType::Double => Some("java/lang/Double"),
            _ => None,
        }
    }

    /// Accessor on the boxed wrapper that yields the primitive back.
    pub fn unbox_accessor(&self) -> Option<&'static str> {
        match self {
            JavaType::Boolean => Some("booleanValue"),
            JavaType::Byte => Some("byteValue"),
            JavaType::Char => Some("charValue"),
            JavaType::Short => Some("shortValue"),
            JavaType::Int => Some("intValue"),
            JavaType::Long => Some("longValue"),
            JavaType::Float => Some("floatValue"),
            JavaType::Double => Some("doubleValue"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub args: Vec<JavaType>,
    pub ret: JavaType,
}

impl MethodDescriptor {
    pub fn parse(desc: &str) -> Result<MethodDescriptor> {
        let Some(inner) = desc.strip_prefix('(') else {
            bail!("method descriptor must start with '(': {desc}");
        };
        let Some(close) = inner.find(')') else {
            bail!("method descriptor missing ')': {desc}");
        };

        let mut args = Vec::new();
        let mut rest = &inner[..close];
        while !rest.is_empty() {
            let (t, remaining) = take_type(rest)?;
            if t == JavaType::Void {
                bail!("void is not a valid argument type: {desc}");
            }
            args.push(t);
            rest = remaining;
        }

        let ret = JavaType::parse(&inner[close + 1..])?;
        Ok(MethodDescriptor { args, ret })
    }

    pub fn descriptor(&self) -> String {
        let mut out = String::from("(");
        for t in &self.args {
            out.push_str(&t.descriptor());
        }
        out.push(')');
        out.push_str(&self.ret.descriptor());
        out
    }
}

/// Constructor descriptor taking the same arguments: `(args...)V`.
pub fn ctor_descriptor(desc: &MethodDescriptor) -> String {
    MethodDescriptor {
        args: desc.args.clone(),
        ret: JavaType::Void,
    }
    .descriptor()
}

/// Prepend the owning class as an explicit first argument, used when an
/// instance method becomes static: slot 0 already held the receiver, so the
/// body is unchanged by the conversion.
pub fn prepend_receiver(desc: &str, owner: &str) -> Result<String> {
    let Some(rest) = desc.strip_prefix('(') else {
        bail!("method descriptor must start with '(': {desc}");
    };
    Ok(format!("(L{owner};{rest}"))
}

fn take_type(desc: &str) -> Result<(JavaType, &str)> {
    let mut chars = desc.char_indices();
    let Some((_, first)) = chars.next() else {
        bail!("empty type descriptor");
    };
    match first {
        'V' => Ok((JavaType::Void, &desc[1..])),
        'Z' => Ok((JavaType::Boolean, &desc[1..])),
        'B' => Ok((JavaType::Byte, &desc[1..])),
        'C' => Ok((JavaType::Char, &desc[1..])),
        'S' => Ok((JavaType::Short, &desc[1..])),
        'I' => Ok((JavaType::Int, &desc[1..])),
        'J' => Ok((JavaType::Long, &desc[1..])),
        'F' => Ok((JavaType::Float, &desc[1..])),
        'D' => Ok((JavaType::Double, &desc[1..])),
        'L' => {
            let Some(end) = desc.find(';') else {
                bail!("object descriptor missing ';': {desc}");
            };
            Ok((JavaType::Object(desc[1..end].to_string()), &desc[end + 1..]))
        }
        '[' => {
            let (element, rest) = take_type(&desc[1..])?;
            if element == JavaType::Void {
                bail!("void is not a valid array element: {desc}");
            }
            let consumed = desc.len() - rest.len();
            Ok((JavaType::Array(desc[..consumed].to_string()), rest))
        }
        other => bail!("unknown type descriptor character '{other}' in {desc}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_method_descriptor_with_mixed_args() {
        let d = MethodDescriptor::parse("(Ljava/lang/Object;IJ[[D)J").unwrap();
        assert_eq!(
            d.args,
            vec![
                JavaType::Object("java/lang/Object".to_string()),
                JavaType::Int,
                JavaType::Long,
                JavaType::Array("[[D".to_string()),
            ]
        );
        assert_eq!(d.ret, JavaType::Long);
        assert_eq!(d.descriptor(), "(Ljava/lang/Object;IJ[[D)J");
    }

    #[test]
    fn parse_rejects_void_argument() {
        assert!(MethodDescriptor::parse("(V)V").is_err());
    }

    #[test]
    fn parse_rejects_truncated_object() {
        assert!(MethodDescriptor::parse("(Ljava/lang/Object)V").is_err());
        assert!(JavaType::parse("Lmissing/semicolon").is_err());
    }

    #[test]
    fn slot_widths_account_for_wide_types() {
        let d = MethodDescriptor::parse("(IJD)V").unwrap();
        let total: u16 = d.args.iter().map(|t| t.slot_width()).sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn boxed_mapping_covers_all_primitives() {
        for (t, wrapper, accessor) in [
            (JavaType::Boolean, "java/lang/Boolean", "booleanValue"),
            (JavaType::Byte, "java/lang/Byte", "byteValue"),
            (JavaType::Char, "java/lang/Character", "charValue"),
            (JavaType::Short, "java/lang/Short", "shortValue"),
            (JavaType::Int, "java/lang/Integer", "intValue"),
            (JavaType::Long, "java/lang/Long", "longValue"),
            (JavaType::Float, "java/lang/Float", "floatValue"),
            (JavaType::Double, "java/lang/Double", "doubleValue"),
        ] {
            assert!(t.is_primitive());
            assert_eq!(t.boxed_internal_name(), Some(wrapper));
            assert_eq!(t.unbox_accessor(), Some(accessor));
        }
        assert_eq!(JavaType::Void.boxed_internal_name(), None);
        assert_eq!(
            JavaType::Object("java/lang/String".to_string()).boxed_internal_name(),
            None
        );
    }

    #[test]
    fn load_and_return_opcodes_follow_type() {
        use crate::model::opcode::*;
        assert_eq!(JavaType::Int.load_opcode(), ILOAD);
        assert_eq!(JavaType::Boolean.load_opcode(), ILOAD);
        assert_eq!(JavaType::Long.load_opcode(), LLOAD);
        assert_eq!(
            JavaType::Array("[I".to_string()).load_opcode(),
            ALOAD
        );
        assert_eq!(JavaType::Void.return_opcode(), RETURN);
        assert_eq!(JavaType::Double.return_opcode(), DRETURN);
        assert_eq!(
            JavaType::Object("java/lang/String".to_string()).return_opcode(),
            ARETURN
        );
    }

    #[test]
    fn prepend_receiver_inserts_owner_type() {
        let converted = prepend_receiver("(I)J", "org/example/Counter").unwrap();
        assert_eq!(converted, "(Lorg/example/Counter;I)J");
    }

    #[test]
    fn ctor_descriptor_erases_return() {
        let d = MethodDescriptor::parse("(Lorg/example/Counter;I)J").unwrap();
        assert_eq!(ctor_descriptor(&d), "(Lorg/example/Counter;I)V");
    }

    #[test]
    fn array_internal_name_is_its_descriptor() {
        let t = JavaType::parse("[Ljava/lang/String;").unwrap();
        assert_eq!(t.internal_name().unwrap(), "[Ljava/lang/String;");
        let o = JavaType::parse("Ljava/lang/String;").unwrap();
        assert_eq!(o.internal_name().unwrap(), "java/lang/String");
        assert!(JavaType::Int.internal_name().is_err());
    }
}
