//! Benchmark for the compiler pipeline stages.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use minic_lang::codegen::generate;
use minic_lang::tree::Tree;
use minic_lang::type_checker::check;

const SUM_PROGRAM: &str = "\
start BOF procedures EOF
BOF BOF
procedures main
main INT WAIN LPAREN dcl COMMA dcl RPAREN LBRACE dcls statements RETURN expr SEMI RBRACE
INT int
WAIN wain
LPAREN (
dcl type ID
type INT
INT int
ID a
COMMA ,
dcl type ID
type INT
INT int
ID b
RPAREN )
LBRACE {
dcls .EMPTY
statements .EMPTY
RETURN return
expr expr PLUS term
expr term
term factor
factor ID
ID a
PLUS +
term factor
factor ID
ID b
SEMI ;
RBRACE }
EOF EOF
";

fn benchmark_tree_decode(c: &mut Criterion) {
    c.bench_function("tree decode (sum program)", |b| {
        b.iter(|| black_box(Tree::decode(SUM_PROGRAM).unwrap()));
    });
}

fn benchmark_type_check(c: &mut Criterion) {
    let tree = Tree::decode(SUM_PROGRAM).unwrap();
    c.bench_function("type check (sum program)", |b| {
        b.iter(|| {
            let mut tree = tree.clone();
            check(&mut tree).unwrap();
            black_box(tree)
        });
    });
}

fn benchmark_codegen(c: &mut Criterion) {
    let mut tree = Tree::decode(SUM_PROGRAM).unwrap();
    check(&mut tree).unwrap();
    c.bench_function("codegen (sum program)", |b| {
        b.iter(|| black_box(generate(&tree).unwrap()));
    });
}

criterion_group!(
    benches,
    benchmark_tree_decode,
    benchmark_type_check,
    benchmark_codegen
);
criterion_main!(benches);
