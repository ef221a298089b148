//! Shared fixtures for unit tests.
//!
//! Every scenario is laid out in a [`SyntheticTarget`]; [`Fixture`] only adds panicking
//! shortcuts for the calls every test makes.

use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
};

use crate::{
    session::Session,
    synthetic::SyntheticTarget,
    target::{
        Address, FieldInfo, LayoutDatabase, RemoteMemory, Target, TypeHandle, TypeLayout,
    },
    Result,
};

/// A synthetic target for one test.
pub struct Fixture(SyntheticTarget);

impl Fixture {
    pub fn new() -> Self {
        Fixture(SyntheticTarget::new().unwrap())
    }

    pub fn target(&self) -> Target {
        self.0.target().unwrap()
    }

    pub fn session(&self) -> Session {
        self.0.session().unwrap()
    }

    /// Session over the same memory, with `owner::field` missing from the layout.
    pub fn session_without(&self, owner: &str, field: &'static str) -> Session {
        let layout = self.0.layout().clone();
        let owner = layout.lookup_type(owner).unwrap();
        let layout = WithoutField {
            layout,
            owner,
            field,
        };
        Session::attach(self.target().with_layout(Arc::new(layout)))
    }
}

/// The synthetic layout minus one member of a struct and of everything deriving from it.
struct WithoutField {
    layout: Arc<LayoutDatabase>,
    owner: TypeHandle,
    field: &'static str,
}

impl TypeLayout for WithoutField {
    fn lookup_type(&self, name: &str) -> Option<TypeHandle> {
        self.layout.lookup_type(name)
    }

    fn field(&self, ty: &TypeHandle, name: &str) -> Option<FieldInfo> {
        if name == self.field && self.layout.is_subtype(ty, &self.owner) {
            return None;
        }
        self.layout.field(ty, name)
    }

    fn superclass(&self, ty: &TypeHandle) -> Option<TypeHandle> {
        self.layout.superclass(ty)
    }

    fn types(&self) -> Vec<TypeHandle> {
        self.layout.types()
    }

    fn find_dynamic_type(
        &self,
        memory: &dyn RemoteMemory,
        address: Address,
        base: &TypeHandle,
    ) -> Result<Option<TypeHandle>> {
        self.layout.find_dynamic_type(memory, address, base)
    }
}

impl Deref for Fixture {
    type Target = SyntheticTarget;

    fn deref(&self) -> &SyntheticTarget {
        &self.0
    }
}

impl DerefMut for Fixture {
    fn deref_mut(&mut self) -> &mut SyntheticTarget {
        &mut self.0
    }
}

// Helper function to create the chain A -> B -> C, indices 1, 2 and 3
pub fn chain() -> (Fixture, [Address; 3]) {
    let mut fixture = Fixture::new();
    let a = fixture.node("AddINode", 1).unwrap();
    let b = fixture.node("AddINode", 2).unwrap();
    let c = fixture.node("AddINode", 3).unwrap();

    fixture.set_inputs(a, &[b], &[]).unwrap();
    fixture.set_inputs(b, &[c], &[]).unwrap();
    fixture.set_outputs(b, &[a]).unwrap();
    fixture.set_outputs(c, &[b]).unwrap();
    (fixture, [a, b, c])
}

// Helper function to create a chain of three frames, returning the innermost:
// String::hashCode @ 4, a runtime stub, com/example/Main::run @ 17
pub fn inlined_frames() -> (Fixture, Address) {
    let mut fixture = Fixture::new();
    let run = fixture.ci_method("com/example/Main", "run", "()V").unwrap();
    let hash = fixture
        .ci_method("java/lang/String", "hashCode", "()I")
        .unwrap();

    let outer = fixture.jvms(Some(run), 17, None).unwrap();
    let stub = fixture.jvms(None, 0, Some(outer)).unwrap();
    let inner = fixture.jvms(Some(hash), 4, Some(stub)).unwrap();
    (fixture, inner)
}

// Helper function to lay out the inline tree
//
//   Main::run
//     @ 3 Main::<init>
//       @ 1 Object::<init>
//     @ 9 String::hashCode
fn build_inline_tree(fixture: &mut Fixture) -> Address {
    let run = fixture.ci_method("com/example/Main", "run", "()V").unwrap();
    let init = fixture
        .ci_method("com/example/Main", "<init>", "()V")
        .unwrap();
    let object_init = fixture
        .ci_method("java/lang/Object", "<init>", "()V")
        .unwrap();
    let hash = fixture
        .ci_method("java/lang/String", "hashCode", "()I")
        .unwrap();

    let root = fixture.inline_tree(Some(run), None, None).unwrap();

    let init_site = fixture.jvms(Some(run), 3, None).unwrap();
    let init_tree = fixture
        .inline_tree(Some(init), Some(init_site), Some(root))
        .unwrap();

    let object_site = fixture.jvms(Some(init), 1, Some(init_site)).unwrap();
    let object_tree = fixture
        .inline_tree(Some(object_init), Some(object_site), Some(init_tree))
        .unwrap();

    let hash_site = fixture.jvms(Some(run), 9, None).unwrap();
    let hash_tree = fixture
        .inline_tree(Some(hash), Some(hash_site), Some(root))
        .unwrap();

    fixture.set_subtrees(root, &[init_tree, hash_tree]).unwrap();
    fixture.set_subtrees(init_tree, &[object_tree]).unwrap();
    root
}

// Helper function to create an inline tree with two children and one grandchild
pub fn inline_scenario() -> (Fixture, Address) {
    let mut fixture = Fixture::new();
    let root = build_inline_tree(&mut fixture);
    (fixture, root)
}

// Helper function to lay out compilation 42 of Main::run with two blocks:
// B0 holds Start (1), B1 holds Return (2) and Root (0)
fn build_scheduled_compile(fixture: &mut Fixture) -> Address {
    let root = fixture.node("RootNode", 0).unwrap();
    let start = fixture.node("StartNode", 1).unwrap();
    let ret = fixture.node("ReturnNode", 2).unwrap();
    fixture.set_inputs(ret, &[start], &[]).unwrap();
    fixture.set_outputs(start, &[ret]).unwrap();
    fixture.set_inputs(root, &[ret], &[]).unwrap();
    fixture.set_outputs(ret, &[root]).unwrap();

    let entry = fixture.block(0, 1.0, &[start]).unwrap();
    let exit = fixture.block(1, 1.0, &[ret, root]).unwrap();
    fixture.set_successors(entry, &[exit]).unwrap();
    fixture.set_idom(exit, entry, 1).unwrap();
    let cfg = fixture.cfg(&[entry, exit], Some(exit)).unwrap();

    let ilt = build_inline_tree(fixture);
    let method = fixture.ci_method("com/example/Main", "run", "()V").unwrap();
    fixture
        .compile(Some(method), 42, -1, Some(root), Some(cfg), Some(ilt))
        .unwrap()
}

// Helper function to create a scheduled compilation, see `build_scheduled_compile`
pub fn scheduled_compile() -> (Fixture, Address) {
    let mut fixture = Fixture::new();
    let compile = build_scheduled_compile(&mut fixture);
    (fixture, compile)
}

// Helper function to create a compiler thread working on the scheduled compilation,
// at tier 4 without OSR
pub fn compiling_thread() -> (Fixture, Address) {
    let mut fixture = Fixture::new();
    let compile = build_scheduled_compile(&mut fixture);
    let method = fixture.method("com/example/Main", "run", "()V").unwrap();
    let task = fixture.compile_task(method, 42, 4, -1).unwrap();
    let env = fixture.ci_env(Some(compile), Some(task)).unwrap();
    let thread = fixture.compiler_thread(Some(env)).unwrap();
    (fixture, thread)
}
