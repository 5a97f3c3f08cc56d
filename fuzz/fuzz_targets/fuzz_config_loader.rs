#![no_main]

use std::path::Path;

use damage_reflection::config::ConfigLoader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(yaml_str) = std::str::from_utf8(data) {
        let loader = ConfigLoader::with_defaults();

        // Only panics matter
        let _ = loader.load_str(yaml_str, Path::new("<fuzz>"));
    }
});
