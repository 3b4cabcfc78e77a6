mod coercion_tests;
mod common;
mod composition_tests;
mod scheduling_tests;
