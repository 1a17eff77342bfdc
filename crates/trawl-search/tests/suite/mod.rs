mod disk;
mod filtering;
mod logging;
mod support;
