// Observers consume simulation state while the solver runs

pub mod imgstream;
