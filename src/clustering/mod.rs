pub mod firm_clustering;
pub mod union_find;
