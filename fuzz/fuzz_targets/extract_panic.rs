#![no_main]
use ferrotex_directive::directive::{ArgFormat, DirectiveQuery, extract_directive};
use ferrotex_directive::{SymbolTable, evaluate};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let s = String::from_utf8_lossy(data);

    let queries = [
        DirectiveQuery::from_count("\\x", -2),
        DirectiveQuery::new("\\x", 2).formats(vec![ArgFormat::UntilBrace, ArgFormat::Alpha]),
        DirectiveQuery::new("\\x", 1).formats(vec![ArgFormat::UntilWhite]).numeric(),
    ];
    for query in &queries {
        let mut text = s.to_string();
        while let Ok(Some(_)) = extract_directive(&mut text, query) {}
    }

    let _ = evaluate(&SymbolTable::new(), &s);
});
