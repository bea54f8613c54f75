mod compile_tests;
mod scenario_tests;
