#![allow(unused_macros)]

/// Helper macro for locking items, propagating poisoning as [`crate::Error::LockError`]
///
/// ```rust, ignore
///  let mut data = lock!(my_mutex);
///  data.some_field = 42;
/// ```
macro_rules! lock {
    ($lock:expr) => {
        $lock.lock().map_err(|_| crate::Error::LockError)?
    };
}

/// Helper macro for reading locked items
///
/// ```rust, ignore
///  let data = read_lock!(my_arc_rwlock);
///  println!("{}", data.some_field);
/// ```
macro_rules! read_lock {
    ($arc_rwlock:expr) => {
        $arc_rwlock.read().map_err(|_| crate::Error::LockError)?
    };
}

/// Helper macro for writing to locked items
///
/// ```rust, ignore
///  let mut data = write_lock!(my_arc_rwlock);
///  data.some_field = 42;
/// ```
macro_rules! write_lock {
    ($arc_rwlock:expr) => {
        $arc_rwlock.write().map_err(|_| crate::Error::LockError)?
    };
}

/// Declares a typed field table for one target struct.
///
/// Each table is a plain struct of [`crate::session::FieldDescriptor`]s plus a `resolve`
/// constructor that looks every member up through the session's memoized resolver. The
/// generated tables are registered with `session::tables::LayoutTables`, which resolves
/// each of them exactly once per target.
///
/// ```rust, ignore
/// field_table! {
///     /// Offsets of `JVMState`
///     pub(crate) struct JvmStateFields = "JVMState" {
///         depth: CInt("_depth"),
///         caller: Address("_caller"),
///     }
/// }
/// ```
macro_rules! field_table {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident = $type_name:literal {
            $($field:ident: $kind:ident($member:literal)),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        $vis struct $name {
            $(pub(crate) $field: crate::session::FieldDescriptor,)*
        }

        impl $name {
            /// Name of the target struct described by this table
            #[allow(dead_code)]
            pub(crate) const TYPE_NAME: &'static str = $type_name;

            pub(crate) fn resolve(state: &crate::session::TargetState) -> crate::Result<Self> {
                Ok(Self {
                    $($field: state.resolve_field(
                        $type_name,
                        $member,
                        crate::session::FieldRequest::$kind,
                    )?,)*
                })
            }
        }
    };
}
