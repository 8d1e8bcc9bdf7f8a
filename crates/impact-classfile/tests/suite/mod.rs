mod method_refs;
mod structure;
