mod helpers;
mod publishers;
