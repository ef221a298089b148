//! Registry of the typed field tables.
//!
//! Every table declared with `field_table!` gets one slot here and one accessor on
//! [`TargetState`]. A slot is resolved on first use and kept for the lifetime of the
//! target, so each `(type, field)` pair is looked up once no matter how many objects of
//! the type are read.

use crate::{
    ci::{CiEnvFields, CiMetadataFields, CompileTaskFields, CompilerThreadFields},
    oops::{ConstMethodFields, ConstantPoolFields, KlassFields, MethodFields, SymbolFields},
    opto::{
        BlockArrayFields, BlockFields, BlockListFields, CallJavaFields, CallRuntimeFields,
        CallStaticJavaFields, CompileFields, InlineTreeFields, JvmStateFields,
        MachCallJavaFields, MachCallRuntimeFields, MachCallStaticJavaFields, MachIfFields,
        MachSafePointFields, NodeArrayFields, NodeFields, NodeListFields, PhaseCfgFields,
        ProjFields, SafePointFields,
    },
    session::TargetState,
    utils::TryOnce,
    vm::{GrowableArrayDataFields, GrowableArrayFields},
    Result,
};

macro_rules! layout_tables {
    ($($accessor:ident: $table:ty),* $(,)?) => {
        /// One resolve-once slot per field table.
        #[derive(Debug, Default)]
        pub(crate) struct LayoutTables {
            $($accessor: TryOnce<$table>,)*
        }

        impl LayoutTables {
            /// Number of tables resolved so far.
            #[cfg(test)]
            pub(crate) fn resolved_count(&self) -> usize {
                0 $(+ usize::from(self.$accessor.get().is_some()))*
            }
        }

        impl TargetState {
            $(
                pub(crate) fn $accessor(&self) -> Result<&$table> {
                    self.tables
                        .$accessor
                        .get_or_try_init(|| <$table>::resolve(self))
                }
            )*
        }
    };
}

layout_tables! {
    node_fields: NodeFields,
    proj_fields: ProjFields,
    safepoint_fields: SafePointFields,
    mach_safepoint_fields: MachSafePointFields,
    mach_if_fields: MachIfFields,
    call_java_fields: CallJavaFields,
    mach_call_java_fields: MachCallJavaFields,
    call_static_java_fields: CallStaticJavaFields,
    mach_call_static_java_fields: MachCallStaticJavaFields,
    call_runtime_fields: CallRuntimeFields,
    mach_call_runtime_fields: MachCallRuntimeFields,
    jvms_fields: JvmStateFields,
    inline_tree_fields: InlineTreeFields,
    growable_array_fields: GrowableArrayFields,
    growable_array_data_fields: GrowableArrayDataFields,
    node_array_fields: NodeArrayFields,
    node_list_fields: NodeListFields,
    block_array_fields: BlockArrayFields,
    block_list_fields: BlockListFields,
    block_fields: BlockFields,
    phase_cfg_fields: PhaseCfgFields,
    compile_fields: CompileFields,
    ci_metadata_fields: CiMetadataFields,
    ci_env_fields: CiEnvFields,
    compile_task_fields: CompileTaskFields,
    compiler_thread_fields: CompilerThreadFields,
    method_fields: MethodFields,
    const_method_fields: ConstMethodFields,
    constant_pool_fields: ConstantPoolFields,
    klass_fields: KlassFields,
    symbol_fields: SymbolFields,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        session::Session,
        target::{FieldKind, LayoutDatabase, MemoryImage, Target},
        test::Fixture,
    };

    #[test]
    fn tables_resolve_once_and_on_demand() {
        let fixture = Fixture::new();
        let session = fixture.session();
        let state = session.state().unwrap();
        assert_eq!(state.tables.resolved_count(), 0);

        let first = state.node_fields().unwrap().idx;
        let descriptors = state.descriptor_count();
        assert_eq!(state.tables.resolved_count(), 1);

        let second = state.node_fields().unwrap().idx;
        assert_eq!(first, second);
        assert_eq!(state.descriptor_count(), descriptors);
        assert_eq!(state.tables.resolved_count(), 1);
    }

    #[test]
    fn missing_member_fails_the_table() {
        let layout = LayoutDatabase::builder()
            .add_type("Block", None, 0x80)
            .add_field("Block", "_nodes", 0x10, FieldKind::Embedded)
            .build()
            .unwrap();
        let session = Session::attach(Target::new(
            Arc::new(MemoryImage::new(8)),
            Arc::new(layout),
        ));
        let state = session.state().unwrap();

        let error = state.block_fields().unwrap_err();
        assert!(error.is_layout_mismatch());
        assert_eq!(state.tables.resolved_count(), 0);
        assert!(state.block_fields().is_err());
    }
}
