pub mod manchester;
