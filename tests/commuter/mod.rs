mod dead_end_test;
