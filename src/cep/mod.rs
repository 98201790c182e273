pub mod frame;

pub use frame::DataFrameList;
