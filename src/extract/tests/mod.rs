mod dom_extractor_tests;
