/// Helper macro to pass arguments to `query_raw` and similar calls, which
/// expect an iterator of `&dyn ToSql` instead of a slice.
///
/// Use `[]` for the macro invocation, e.g. `dbargs![]` or `dbargs![&id]`.
macro_rules! dbargs {
    () => {
        [] as [&(dyn postgres_types::ToSql + Sync); 0]
    };
    ($($arg:expr),+ $(,)?) => {
        [$($arg as &(dyn postgres_types::ToSql + Sync)),+]
    };
}

pub(crate) use dbargs;
