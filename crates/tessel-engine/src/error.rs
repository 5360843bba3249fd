//! Engine errors

use tessel_expr::ExprError;

/// Engine error
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("template parse error: {0}")]
    Template(#[from] tessel_html::ParseError),

    #[error("DOM error: {0}")]
    Dom(#[from] tessel_dom::DomError),

    #[error("expression `{expression}` failed: {source}")]
    Expression {
        expression: String,
        #[source]
        source: ExprError,
    },

    #[error("unknown component: {0}")]
    UnknownComponent(String),

    #[error("engine has been torn down")]
    TornDown,
}
