//! Small helper macros shared across the crate.

/// Render a template file under `templates/` (path relative to `src/`) with
/// a `tera::Context` built from the named fields, as a one-off render with
/// no shared `Tera` instance — every template here is rendered at most a
/// handful of times per run, so compiling a registry up front buys nothing.
#[macro_export]
macro_rules! tpl {
	($path:literal => { $($field:ident),+ $(,)? }) => {{
		let mut ctx = ::tera::Context::new();
		$( ctx.insert(stringify!($field), &$field); )+
		::tera::Tera::one_off(include_str!($path), &ctx, false)
	}};
}
