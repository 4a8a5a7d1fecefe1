use crate::bounded::BoxError;

/// A template engine used by [`Context::render`](crate::Context::render).
pub trait Views: Send + Sync {
    /// Render the template `name` into `out`, with the given bindings.
    ///
    /// If `layout` is set, the rendered template should be embedded in it.
    fn render(
        &self,
        out: &mut Vec<u8>,
        name: &str,
        bind: &serde_json::Value,
        layout: Option<&str>,
    ) -> Result<(), BoxError>;
}
