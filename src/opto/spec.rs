//! Kind-specific suffixes of node dump lines.
//!
//! Mirrors what the compiler prints after the edge lists of a node: projection numbers,
//! branch probabilities, call targets and, for every safepoint, the chain of inlined
//! frames it records.

use std::fmt::Write as _;

use crate::{
    ci::CiMethod,
    opto::{JvmState, Node, NodeKind},
    session::{FieldDescriptor, Session, TargetState},
    Result,
};

field_table! {
    /// Members of `ProjNode`, shared by all projection kinds
    pub(crate) struct ProjFields = "ProjNode" {
        con: CInt("_con"),
    }
}

field_table! {
    /// Members of `SafePointNode`
    pub(crate) struct SafePointFields = "SafePointNode" {
        jvms: Address("_jvms"),
    }
}

field_table! {
    /// Members of `MachSafePointNode`
    pub(crate) struct MachSafePointFields = "MachSafePointNode" {
        jvms: Address("_jvms"),
    }
}

field_table! {
    /// Members of `MachIfNode`
    pub(crate) struct MachIfFields = "MachIfNode" {
        prob: Float("_prob"),
        fcnt: Float("_fcnt"),
    }
}

field_table! {
    /// Members of `CallJavaNode`
    pub(crate) struct CallJavaFields = "CallJavaNode" {
        method: Address("_method"),
    }
}

field_table! {
    /// Members of `MachCallJavaNode`
    pub(crate) struct MachCallJavaFields = "MachCallJavaNode" {
        method: Address("_method"),
    }
}

field_table! {
    /// Members of `CallStaticJavaNode`
    pub(crate) struct CallStaticJavaFields = "CallStaticJavaNode" {
        name: Address("_name"),
    }
}

field_table! {
    /// Members of `MachCallStaticJavaNode`
    pub(crate) struct MachCallStaticJavaFields = "MachCallStaticJavaNode" {
        name: Address("_name"),
    }
}

field_table! {
    /// Members of `CallRuntimeNode`
    pub(crate) struct CallRuntimeFields = "CallRuntimeNode" {
        name: Address("_name"),
    }
}

field_table! {
    /// Members of `MachCallRuntimeNode`
    pub(crate) struct MachCallRuntimeFields = "MachCallRuntimeNode" {
        name: Address("_name"),
    }
}

impl Node {
    /// Kind-specific suffix of this node's dump line.
    ///
    /// Empty for kinds without extra state. Every non-empty suffix starts with a space.
    ///
    /// # Errors
    ///
    /// Layout and memory errors of the node or the frames it refers to.
    pub fn dump_spec(&self, session: &Session) -> Result<String> {
        let state = session.state()?;
        let kind = self.kind();
        let mut spec = String::new();

        if kind.is_a(NodeKind::Proj) {
            let con = state
                .proj_fields()?
                .con
                .read_int::<u32>(state.memory(), self.address())?;
            write!(spec, " #{con}")?;
        }

        if kind.is_a(NodeKind::MachIf) {
            let fields = state.mach_if_fields()?;
            let prob = fields.prob.read_f32(state.memory(), self.address())?;
            let fcnt = fields.fcnt.read_f32(state.memory(), self.address())?;
            write!(spec, " P={prob:.6}, C={fcnt:.6}")?;
        }

        if kind.is_a(NodeKind::CallStaticJava) {
            let name = state.call_static_java_fields()?.name;
            self.write_stub_name(&state, name, " # Static", &mut spec)?;
        } else if kind.is_a(NodeKind::MachCallStaticJava) {
            let name = state.mach_call_static_java_fields()?.name;
            self.write_stub_name(&state, name, " # Static", &mut spec)?;
        }

        if kind.is_a(NodeKind::CallDynamicJava) || kind.is_a(NodeKind::MachCallDynamicJava) {
            spec.push_str(" # Dynamic");
        }

        if let Some(method) = self.call_method(session)? {
            write!(spec, " {}", method.short_name(session)?)?;
        }

        if kind.is_a(NodeKind::CallRuntime) {
            let name = state.call_runtime_fields()?.name;
            self.write_stub_name(&state, name, " #", &mut spec)?;
        } else if kind.is_a(NodeKind::MachCallRuntime) {
            let name = state.mach_call_runtime_fields()?.name;
            self.write_stub_name(&state, name, " #", &mut spec)?;
        }

        if let Some(jvms) = self.jvms(session)? {
            jvms.write_spec(session, &mut spec)?;
        }

        Ok(spec)
    }

    /// Debug info of a safepoint-family node.
    ///
    /// Returns `None` for other kinds and for safepoints without a recorded state.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn jvms(&self, session: &Session) -> Result<Option<JvmState>> {
        let state = session.state()?;
        let kind = self.kind();
        let field = if kind.is_a(NodeKind::SafePoint) {
            state.safepoint_fields()?.jvms
        } else if kind.is_a(NodeKind::MachSafePoint) {
            state.mach_safepoint_fields()?.jvms
        } else {
            return Ok(None);
        };

        Ok(JvmState::new(
            field.read_address(state.memory(), self.address())?,
        ))
    }

    /// Target method of a Java call, ideal or matched.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn call_method(&self, session: &Session) -> Result<Option<CiMethod>> {
        let state = session.state()?;
        let kind = self.kind();
        let field = if kind.is_a(NodeKind::CallJava) {
            state.call_java_fields()?.method
        } else if kind.is_a(NodeKind::MachCallJava) {
            state.mach_call_java_fields()?.method
        } else {
            return Ok(None);
        };

        Ok(CiMethod::new(
            field.read_address(state.memory(), self.address())?,
        ))
    }

    fn write_stub_name(
        &self,
        state: &TargetState,
        field: FieldDescriptor,
        prefix: &str,
        spec: &mut String,
    ) -> Result<()> {
        let name = field.read_address(state.memory(), self.address())?;
        if let Some(name) = name.non_null() {
            write!(spec, "{prefix} {}", state.memory().read_c_string(name)?)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{target::Address, test::Fixture};

    #[test]
    fn projection_and_branch() {
        let mut fixture = Fixture::new();
        let proj = fixture.node("IfTrueNode", 4).unwrap();
        fixture.set_int(proj, "ProjNode", "_con", 1).unwrap();
        let mach_proj = fixture.node("MachProjNode", 5).unwrap();
        fixture.set_int(mach_proj, "ProjNode", "_con", 7).unwrap();
        let branch = fixture.node("MachIfNode", 6).unwrap();
        fixture.set_float(branch, "MachIfNode", "_prob", 0.25).unwrap();
        fixture.set_float(branch, "MachIfNode", "_fcnt", 100.0).unwrap();
        let session = fixture.session();

        let spec = |address| {
            session
                .node_at(address)
                .unwrap()
                .unwrap()
                .dump_spec(&session)
                .unwrap()
        };
        assert_eq!(spec(proj), " #1");
        assert_eq!(spec(mach_proj), " #7");
        assert_eq!(spec(branch), " P=0.250000, C=100.000000");
    }

    #[test]
    fn calls() {
        let mut fixture = Fixture::new();
        let callee = fixture
            .ci_method("java/lang/String", "hashCode", "()I")
            .unwrap();
        let caller = fixture
            .ci_method("com/example/Main", "run", "()V")
            .unwrap();
        let jvms = fixture.jvms(Some(caller), 12, None).unwrap();

        let call = fixture.node("CallStaticJavaNode", 10).unwrap();
        fixture.set_pointer(call, "CallJavaNode", "_method", callee).unwrap();
        fixture.set_pointer(call, "SafePointNode", "_jvms", jvms).unwrap();

        let trap = fixture.node("CallStaticJavaNode", 11).unwrap();
        let trap_name = fixture.c_string("uncommon_trap").unwrap();
        fixture.set_pointer(trap, "CallStaticJavaNode", "_name", trap_name).unwrap();

        let dynamic = fixture.node("MachCallDynamicJavaNode", 12).unwrap();
        fixture
            .set_pointer(dynamic, "MachCallJavaNode", "_method", callee)
            .unwrap();

        let runtime = fixture.node("CallLeafNode", 13).unwrap();
        let stub = fixture.c_string("SharedRuntime::dsin").unwrap();
        fixture.set_pointer(runtime, "CallRuntimeNode", "_name", stub).unwrap();
        let stub_jvms = fixture.jvms(None, 0, None).unwrap();
        fixture.set_pointer(runtime, "SafePointNode", "_jvms", stub_jvms).unwrap();

        let session = fixture.session();
        let spec = |address: Address| {
            session
                .node_at(address)
                .unwrap()
                .unwrap()
                .dump_spec(&session)
                .unwrap()
        };

        assert_eq!(spec(call), " java/lang/String::hashCode Main::run @ bci:12");
        assert_eq!(spec(trap), " # Static uncommon_trap");
        assert_eq!(spec(dynamic), " # Dynamic java/lang/String::hashCode");
        assert_eq!(spec(runtime), " # SharedRuntime::dsin runtime stub");
    }

    #[test]
    fn calls_need_only_the_members_they_print() {
        let mut fixture = Fixture::new();
        let callee = fixture
            .ci_method("java/lang/String", "hashCode", "()I")
            .unwrap();
        let call = fixture.node("CallStaticJavaNode", 10).unwrap();
        fixture.set_pointer(call, "CallJavaNode", "_method", callee).unwrap();
        let mach_call = fixture.node("MachCallDynamicJavaNode", 11).unwrap();
        fixture
            .set_pointer(mach_call, "MachCallJavaNode", "_method", callee)
            .unwrap();

        for session in [
            fixture.session_without("CallJavaNode", "_bci"),
            fixture.session_without("MachCallJavaNode", "_bci"),
        ] {
            let call = session.node_at(call).unwrap().unwrap();
            assert_eq!(
                call.format_line(&session).unwrap(),
                " 10\tCallStaticJava\t=== [[ ]] java/lang/String::hashCode"
            );
            let mach_call = session.node_at(mach_call).unwrap().unwrap();
            assert_eq!(
                mach_call.dump_spec(&session).unwrap(),
                " # Dynamic java/lang/String::hashCode"
            );
        }

        // Members that are printed still have to be there
        let session = fixture.session_without("CallJavaNode", "_method");
        let call = session.node_at(call).unwrap().unwrap();
        assert!(call.dump_spec(&session).unwrap_err().is_layout_mismatch());
    }
}
