use latchbench::dlatch::{test_dlatch, test_dlatch_random, test_dlatch_strict};

// Specify tests to be executed
latchbench::run_with_vpi!(test_dlatch, test_dlatch_strict, test_dlatch_random);
