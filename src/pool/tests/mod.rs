mod controller;
mod worker;
