mod shared_turnout_test;
