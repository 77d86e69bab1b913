//! The Transactify transformation.
//!
//! For every method carrying the marker annotation, the owning class gains
//! a static context field and initializer code, the original body moves to
//! a renamed package-private static method, a public dispatch method with
//! the original surface routes the call through the context, and a sibling
//! call-capture class is synthesized to package the arguments. Classes
//! without marked methods pass through untouched.
//!
//! To weave `@Atomic public long add(int delta)` on `Counter`, the class
//! becomes:
//!
//! ```text
//! public static final AtomicContext context$add;        // initialized in <clinit>
//! public long add(int delta) {
//!     return (unbox) context$add.doTransactionally(
//!         new Counter$atomicannotation$callable$add(this, delta));
//! }
//! static synthetic long atomic$add(Counter self, int delta) { /* original body */ }
//! ```

use crate::descriptor::{JavaType, MethodDescriptor, ctor_descriptor, prepend_receiver};
use crate::model::opcode::*;
use crate::model::{
    ACC_ABSTRACT, ACC_FINAL, ACC_NATIVE, ACC_PRIVATE, ACC_PROTECTED, ACC_PUBLIC, ACC_STATIC,
    ACC_SYNTHETIC, AnnotationUnit, AnnotationValue, CAPTURE_CLASS_VERSION, ClassUnit, Const,
    FieldUnit, Insn, MethodUnit,
};
use crate::schema::{
    CALLABLE_INTERNAL, CONTEXT_DESC, CONTEXT_FACTORY_OPTION, CONTEXT_INTERNAL, CONTEXT_METHOD,
    CONTEXT_METHOD_DESC, FACTORY_METHOD, INSTANCE_INTERNAL, MARKER_DESC, SchemaTables,
};
use anyhow::{Context, Result, bail};
use std::collections::HashMap;

const GENERATED_SOURCE: &str = "Generated by atomic-weaver";

#[derive(Debug)]
pub struct WovenUnit {
    pub class: ClassUnit,
    /// Synthesized call-capture classes, one per woven method.
    pub captures: Vec<ClassUnit>,
    /// Externally visible names of the woven methods, in weave order.
    pub woven_methods: Vec<String>,
}

pub fn transactify(unit: ClassUnit, schema: &SchemaTables) -> Result<WovenUnit> {
    let ClassUnit {
        version,
        access,
        name: owner,
        signature,
        super_name,
        interfaces,
        source,
        mut fields,
        methods: input_methods,
    } = unit;

    let mut weaver = Transactifier {
        schema,
        owner: owner.clone(),
        name_counts: HashMap::new(),
        clinit_code: Vec::new(),
    };

    let mut methods = Vec::with_capacity(input_methods.len() + 2);
    let mut captures = Vec::new();
    let mut woven_methods = Vec::new();
    let mut original_clinit = None;

    for mut method in input_methods {
        if method.name == "<clinit>" {
            original_clinit = Some(method);
            continue;
        }

        match take_marker(&mut method) {
            Some(marker) => {
                let visible_name = method.name.clone();
                let (dispatch, internal, capture, context_field) = weaver
                    .weave_method(method, &marker)
                    .with_context(|| format!("weaving {owner}.{visible_name}"))?;
                fields.push(context_field);
                methods.push(dispatch);
                methods.push(internal);
                captures.push(capture);
                woven_methods.push(visible_name);
            }
            None => methods.push(method),
        }
    }

    if woven_methods.is_empty() {
        // Preserve any existing initializer untouched.
        if let Some(clinit) = original_clinit {
            methods.push(clinit);
        }
    } else {
        let mut instructions = weaver.clinit_code;
        match original_clinit {
            // Control falls through into the original body; its final
            // return closes the combined block.
            Some(original) => instructions.extend(original.instructions),
            None => instructions.push(Insn::Simple(RETURN)),
        }
        methods.push(MethodUnit {
            access: ACC_STATIC,
            name: "<clinit>".to_string(),
            desc: "()V".to_string(),
            signature: None,
            exceptions: vec![],
            visible_annotations: vec![],
            invisible_annotations: vec![],
            annotation_default: None,
            instructions,
        });
    }

    Ok(WovenUnit {
        class: ClassUnit {
            version,
            access,
            name: owner,
            signature,
            super_name,
            interfaces,
            source,
            fields,
            methods,
        },
        captures,
        woven_methods,
    })
}

/// Remove the marker annotation from whichever tier carries it.
fn take_marker(method: &mut MethodUnit) -> Option<AnnotationUnit> {
    for tier in [&mut method.invisible_annotations, &mut method.visible_annotations] {
        if let Some(pos) = tier.iter().position(|a| a.desc == MARKER_DESC) {
            return Some(tier.remove(pos));
        }
    }
    None
}

struct Transactifier<'a> {
    schema: &'a SchemaTables,
    owner: String,
    name_counts: HashMap<String, u32>,
    clinit_code: Vec<Insn>,
}

impl Transactifier<'_> {
    fn weave_method(
        &mut self,
        method: MethodUnit,
        marker: &AnnotationUnit,
    ) -> Result<(MethodUnit, MethodUnit, ClassUnit, FieldUnit)> {
        if method.name == "<init>" {
            bail!("constructors cannot be woven");
        }
        if method.access & (ACC_ABSTRACT | ACC_NATIVE) != 0 {
            bail!("abstract and native methods have no body to weave");
        }

        let woven_name = self.disambiguate(&method.name);
        let field_name = format!("context${woven_name}");
        let capture_name = format!("{}$atomicannotation$callable${}", self.owner, woven_name);
        let internal_name = format!("atomic${woven_name}");

        let merged = self.schema.merged_options(marker);
        self.emit_context_init(&field_name, &merged)?;

        let context_field = FieldUnit {
            access: ACC_PUBLIC | ACC_STATIC | ACC_FINAL,
            name: field_name.clone(),
            desc: CONTEXT_DESC.to_string(),
            signature: None,
        };

        // Dispatch keeps the original surface: name, descriptor, signature,
        // exceptions and every non-marker annotation from both tiers.
        let mut dispatch = MethodUnit {
            access: method.access,
            name: method.name.clone(),
            desc: method.desc.clone(),
            signature: method.signature.clone(),
            exceptions: method.exceptions.clone(),
            visible_annotations: method.visible_annotations.clone(),
            invisible_annotations: method.invisible_annotations.clone(),
            annotation_default: None,
            instructions: vec![],
        };

        let was_static = method.is_static();
        let mut internal = method;
        internal.name = internal_name.clone();
        internal.visible_annotations.clear();
        internal.invisible_annotations.clear();
        internal.access &= !(ACC_PUBLIC | ACC_PRIVATE | ACC_PROTECTED);
        internal.access |= ACC_SYNTHETIC;
        if !was_static {
            // Slot 0 already held the receiver, so the body is valid as a
            // static method with the owner as explicit first argument.
            internal.access |= ACC_STATIC;
            internal.desc = prepend_receiver(&internal.desc, &self.owner)?;
        }

        let internal_desc = MethodDescriptor::parse(&internal.desc)
            .with_context(|| format!("unparseable descriptor {}", internal.desc))?;

        dispatch.instructions =
            self.dispatch_code(&field_name, &capture_name, &internal_desc)?;
        let capture = self.build_capture(&capture_name, &internal_name, &internal_desc);

        Ok((dispatch, internal, capture, context_field))
    }

    fn disambiguate(&mut self, base: &str) -> String {
        let count = self.name_counts.entry(base.to_string()).or_insert(0);
        let suffix = *count;
        *count += 1;
        if suffix == 0 {
            base.to_string()
        } else {
            format!("{base}${suffix}")
        }
    }

    /// Initializer code for one context field: construct a configuration
    /// instance from the merged options in the schema's declared field
    /// order, ask the configured factory for a context, store it.
    fn emit_context_init(
        &mut self,
        field_name: &str,
        merged: &HashMap<String, AnnotationValue>,
    ) -> Result<()> {
        let code = &mut self.clinit_code;
        code.push(Insn::Type {
            opcode: NEW,
            name: INSTANCE_INTERNAL.to_string(),
        });
        code.push(Insn::Simple(DUP));
        for field in self.schema.config_fields() {
            let Some(value) = merged.get(&field.name) else {
                bail!(
                    "no option value for configuration field '{}': marker options and configuration schema disagree",
                    field.name
                );
            };
            code.push(Insn::Ldc(constant_for(value)?));
        }
        code.push(Insn::Method {
            opcode: INVOKESPECIAL,
            owner: INSTANCE_INTERNAL.to_string(),
            name: "<init>".to_string(),
            desc: self.schema.config_ctor_desc().to_string(),
        });
        code.push(Insn::Method {
            opcode: INVOKESTATIC,
            owner: factory_internal_name(merged)?,
            name: FACTORY_METHOD.to_string(),
            desc: format!("({MARKER_DESC}){CONTEXT_DESC}"),
        });
        code.push(Insn::Field {
            opcode: PUTSTATIC,
            owner: self.owner.clone(),
            name: field_name.to_string(),
            desc: CONTEXT_DESC.to_string(),
        });
        Ok(())
    }

    /// Body of the public dispatch method: fetch the context, capture the
    /// live arguments, run transactionally, coerce the result back to the
    /// declared return type.
    fn dispatch_code(
        &self,
        field_name: &str,
        capture_name: &str,
        internal_desc: &MethodDescriptor,
    ) -> Result<Vec<Insn>> {
        let mut code = vec![
            Insn::Field {
                opcode: GETSTATIC,
                owner: self.owner.clone(),
                name: field_name.to_string(),
                desc: CONTEXT_DESC.to_string(),
            },
            Insn::Type {
                opcode: NEW,
                name: capture_name.to_string(),
            },
            Insn::Simple(DUP),
        ];

        let mut slot = 0u16;
        for arg in &internal_desc.args {
            code.push(Insn::Var {
                opcode: arg.load_opcode(),
                slot,
            });
            slot += arg.slot_width();
        }
        code.push(Insn::Method {
            opcode: INVOKESPECIAL,
            owner: capture_name.to_string(),
            name: "<init>".to_string(),
            desc: ctor_descriptor(internal_desc),
        });
        code.push(Insn::Method {
            opcode: INVOKEINTERFACE,
            owner: CONTEXT_INTERNAL.to_string(),
            name: CONTEXT_METHOD.to_string(),
            desc: CONTEXT_METHOD_DESC.to_string(),
        });

        let ret = &internal_desc.ret;
        if ret.is_reference() {
            code.push(Insn::Type {
                opcode: CHECKCAST,
                name: ret.internal_name()?.to_string(),
            });
        } else if let (Some(boxed), Some(accessor)) =
            (ret.boxed_internal_name(), ret.unbox_accessor())
        {
            code.push(Insn::Type {
                opcode: CHECKCAST,
                name: boxed.to_string(),
            });
            code.push(Insn::Method {
                opcode: INVOKEVIRTUAL,
                owner: boxed.to_string(),
                name: accessor.to_string(),
                desc: format!("(){}", ret.descriptor()),
            });
        }
        // A void return discards the context's result: the operand stack
        // need not be empty at a return instruction.
        code.push(Insn::Simple(ret.return_opcode()));
        Ok(code)
    }

    /// Synthesize the call-capture class: one private final field per
    /// argument, a positional constructor, and `call()` re-invoking the
    /// internal method with the captured arguments.
    fn build_capture(
        &self,
        capture_name: &str,
        internal_name: &str,
        internal_desc: &MethodDescriptor,
    ) -> ClassUnit {
        let ret = &internal_desc.ret;
        let result_desc = if let Some(boxed) = ret.boxed_internal_name() {
            format!("L{boxed};")
        } else if *ret == JavaType::Void {
            "Ljava/lang/Void;".to_string()
        } else {
            ret.descriptor()
        };

        let fields = internal_desc
            .args
            .iter()
            .enumerate()
            .map(|(i, arg)| FieldUnit {
                access: ACC_PRIVATE | ACC_FINAL,
                name: format!("arg{i}"),
                desc: arg.descriptor(),
                signature: None,
            })
            .collect();

        let mut ctor_code = vec![
            Insn::Var {
                opcode: ALOAD,
                slot: 0,
            },
            Insn::Method {
                opcode: INVOKESPECIAL,
                owner: "java/lang/Object".to_string(),
                name: "<init>".to_string(),
                desc: "()V".to_string(),
            },
        ];
        let mut slot = 1u16;
        for (i, arg) in internal_desc.args.iter().enumerate() {
            ctor_code.push(Insn::Var {
                opcode: ALOAD,
                slot: 0,
            });
            ctor_code.push(Insn::Var {
                opcode: arg.load_opcode(),
                slot,
            });
            ctor_code.push(Insn::Field {
                opcode: PUTFIELD,
                owner: capture_name.to_string(),
                name: format!("arg{i}"),
                desc: arg.descriptor(),
            });
            slot += arg.slot_width();
        }
        ctor_code.push(Insn::Simple(RETURN));

        let ctor = MethodUnit {
            access: ACC_PUBLIC,
            name: "<init>".to_string(),
            desc: ctor_descriptor(internal_desc),
            signature: None,
            exceptions: vec![],
            visible_annotations: vec![],
            invisible_annotations: vec![],
            annotation_default: None,
            instructions: ctor_code,
        };

        let mut call_code = Vec::new();
        for (i, arg) in internal_desc.args.iter().enumerate() {
            call_code.push(Insn::Var {
                opcode: ALOAD,
                slot: 0,
            });
            call_code.push(Insn::Field {
                opcode: GETFIELD,
                owner: capture_name.to_string(),
                name: format!("arg{i}"),
                desc: arg.descriptor(),
            });
        }
        call_code.push(Insn::Method {
            opcode: INVOKESTATIC,
            owner: self.owner.clone(),
            name: internal_name.to_string(),
            desc: internal_desc.descriptor(),
        });
        if *ret == JavaType::Void {
            call_code.push(Insn::Simple(ACONST_NULL));
        } else if let Some(boxed) = ret.boxed_internal_name() {
            call_code.push(Insn::Method {
                opcode: INVOKESTATIC,
                owner: boxed.to_string(),
                name: "valueOf".to_string(),
                desc: format!("({})L{boxed};", ret.descriptor()),
            });
        }
        call_code.push(Insn::Simple(ARETURN));

        let call = MethodUnit {
            access: ACC_PUBLIC,
            name: "call".to_string(),
            desc: "()Ljava/lang/Object;".to_string(),
            signature: None,
            exceptions: vec![],
            visible_annotations: vec![],
            invisible_annotations: vec![],
            annotation_default: None,
            instructions: call_code,
        };

        ClassUnit {
            version: CAPTURE_CLASS_VERSION,
            access: ACC_FINAL,
            name: capture_name.to_string(),
            signature: Some(format!(
                "Ljava/lang/Object;L{CALLABLE_INTERNAL}<{result_desc}>;"
            )),
            super_name: Some("java/lang/Object".to_string()),
            interfaces: vec![CALLABLE_INTERNAL.to_string()],
            source: Some(GENERATED_SOURCE.to_string()),
            fields,
            methods: vec![ctor, call],
        }
    }
}

fn constant_for(value: &AnnotationValue) -> Result<Const> {
    Ok(match value {
        AnnotationValue::Boolean(v) => Const::Int(*v as i32),
        AnnotationValue::Byte(v) => Const::Int(*v as i32),
        AnnotationValue::Char(v) => Const::Int(*v as i32),
        AnnotationValue::Short(v) => Const::Int(*v as i32),
        AnnotationValue::Int(v) => Const::Int(*v),
        AnnotationValue::Long(v) => Const::Long(*v),
        AnnotationValue::Float(v) => Const::Float(*v),
        AnnotationValue::Double(v) => Const::Double(*v),
        AnnotationValue::Str(v) => Const::Str(v.clone()),
        AnnotationValue::Type(desc) => Const::Class(desc.clone()),
        other => bail!("option value {other:?} cannot be pushed as a constant"),
    })
}

fn factory_internal_name(merged: &HashMap<String, AnnotationValue>) -> Result<String> {
    let Some(value) = merged.get(CONTEXT_FACTORY_OPTION) else {
        bail!("no '{CONTEXT_FACTORY_OPTION}' option value");
    };
    let AnnotationValue::Type(desc) = value else {
        bail!("'{CONTEXT_FACTORY_OPTION}' option must be a type reference, got {value:?}");
    };
    match JavaType::parse(desc)? {
        JavaType::Object(name) => Ok(name),
        other => bail!("'{CONTEXT_FACTORY_OPTION}' option must name a class, got {other:?}"),
    }
}
