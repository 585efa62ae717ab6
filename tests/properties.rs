//! Property tests over the pipeline and the heap.

use proptest::prelude::*;

use sigil::common::{
    data::Data,
    opcode::BinOp,
    source::Source,
};
use sigil::compiler::{gen, lex::Lexer, parse::Parser, Token};
use sigil::vm::{heap::Composite, Heap, Vm};

/// Runs without the analyzer or optimizer in the loop.
fn run_unoptimized(source: &str) -> Option<Data> {
    let tokens = Lexer::lex(Source::source(source)).unwrap();
    let tree = Parser::parse(tokens).unwrap();
    Vm::run_program(gen::gen(&tree).unwrap()).unwrap()
}

proptest! {
    #[test]
    fn lexer_doesnt_crash(s in "\\PC*") {
        let result = Lexer::lex(Source::source(&s));
        format!("{:?}", result);
    }

    #[test]
    fn decimal_literals_lex_to_one_token(whole in 0u32..1000000, frac in 0u32..100) {
        let formatted = format!("{}.{:02}", whole, frac);
        let expected: f64 = formatted.parse().unwrap();
        let tokens = Lexer::lex(Source::source(&formatted)).unwrap();

        // the literal plus the end-of-input marker
        prop_assert_eq!(tokens.len(), 2);
        prop_assert_eq!(&tokens[0].item, &Token::Number(expected));
    }

    /// The optimizer must be invisible: for any binary operator over
    /// nonzero integer literals, the optimized pipeline and a straight
    /// parse-and-run produce the same result.
    #[test]
    fn optimization_preserves_results(
        op in any::<BinOp>(),
        a in 1..1000i32,
        b in 1..1000i32,
    ) {
        let source = format!("{} {} {}", a, op, b);
        let optimized = sigil::run(&source).unwrap();
        let plain = run_unoptimized(&source);
        prop_assert_eq!(optimized, plain);
    }

    #[test]
    fn folding_agrees_with_evaluation(a in -1000..1000i32, b in -1000..1000i32) {
        let sum = sigil::run(&format!("{} + {}", a, b)).unwrap();
        prop_assert_eq!(sum, Some(Data::Number((a + b) as f64)));

        let product = sigil::run(&format!("{} * {}", a, b)).unwrap();
        prop_assert_eq!(product, Some(Data::Number((a as f64) * (b as f64))));
    }

    /// Allocation accounting: after a collection, exactly the retained
    /// blocks remain and usage is exactly their total size.
    #[test]
    fn collection_keeps_exactly_the_retained(lengths in prop::collection::vec(0usize..32, 1..16)) {
        let mut heap = Heap::new();
        let mut handles = vec![];
        for length in &lengths {
            let value = Composite::List(vec![Data::Number(0.0); *length]);
            handles.push(heap.alloc(value).unwrap());
        }

        let mut retained_size = 0;
        for (index, handle) in handles.iter().enumerate() {
            if index % 2 == 0 {
                heap.retain(*handle);
                retained_size += heap.get(*handle).unwrap().size();
            }
        }

        heap.collect(&[]);

        prop_assert_eq!(heap.used(), retained_size);
        for (index, handle) in handles.iter().enumerate() {
            prop_assert_eq!(heap.get(*handle).is_ok(), index % 2 == 0);
        }
    }

    /// The budget holds: a heap never reports more in use than its
    /// capacity, no matter the allocation pattern.
    #[test]
    fn usage_never_exceeds_capacity(lengths in prop::collection::vec(0usize..64, 1..32)) {
        let mut heap = Heap::with_capacity(4096);
        for length in lengths {
            let value = Composite::List(vec![Data::Number(0.0); length]);
            // failures are fine, accounting must stay consistent either way
            let _ = heap.alloc(value);
            prop_assert!(heap.used() <= heap.capacity());
        }
    }
}
