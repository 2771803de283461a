mod simulation_engine_tests;
mod support;
