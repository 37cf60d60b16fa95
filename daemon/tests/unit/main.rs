mod support;
mod test_motion;
mod test_orchestrator;
mod test_session;
