#![no_main]

use libfuzzer_sys::fuzz_target;
use optoscope::synthetic::SyntheticTarget;
use std::io;

// The input replaces everything after the vtable of one node, then spills into the
// memory right behind it. Walks over such garbage must end in an error, never a panic.
fuzz_target!(|data: &[u8]| {
    let Ok(mut target) = SyntheticTarget::with_capacity(0x2000) else {
        return;
    };
    let Ok(node) = target.node("PhiNode", 1) else {
        return;
    };
    let Ok(scratch) = target.alloc(0x1000) else {
        return;
    };

    let (body, rest) = data.split_at(data.len().min(0x48));
    let _ = target.write_bytes(node.plus_offset(8), body);
    let _ = target.write_bytes(scratch, &rest[..rest.len().min(0x1000)]);

    let Ok(session) = target.session() else {
        return;
    };
    if let Ok(Some(root)) = session.node_at(node) {
        let _ = root.dump(&session, 8, &mut io::sink());
        let _ = root.dump(&session, -8, &mut io::sink());
    }
});
