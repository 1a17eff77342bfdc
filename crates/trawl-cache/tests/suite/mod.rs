// Consolidated integration test suite for the metadata cache.
mod invalidation;
mod persistence;
mod view;
