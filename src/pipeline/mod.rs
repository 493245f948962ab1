pub mod blob_store;
pub mod persistence;
pub mod project;
pub mod slices;
pub mod store_worker;
pub mod tracks;

#[cfg(test)]
pub mod test_fixture;
