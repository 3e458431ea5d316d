mod common;
mod crawl_result_tests;
