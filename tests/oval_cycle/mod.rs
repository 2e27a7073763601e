mod engine_shutdown_test;
mod full_lap_test;
