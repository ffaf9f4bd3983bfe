use ccag_model::ModelError;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("constraints of model '{model}' admit no complete test case")]
    Unsatisfiable { model: String },

    #[error("SAT solver error: {0}")]
    Solver(String),

    #[error("unknown constraint handler '{0}' (expected verify, solver, replace or tolerate)")]
    UnknownHandler(String),
}
