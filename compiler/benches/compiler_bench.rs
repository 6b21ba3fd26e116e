use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ccc::ast::*;
use ccc::check;
use ccc::types::{Primitive, Type};
use ccc::value::Value;

// ── Value coercion ──────────────────────────────────────────────────────

fn bench_value_coercion(c: &mut Criterion) {
    c.bench_function("broadcast_into_vector_256", |b| {
        let source = Value::from_f64(0.25);
        b.iter(|| {
            let mut v = Value::zero(Type::vector(Primitive::Float32, 256));
            v.set_from_value(black_box(&source));
            black_box(v)
        });
    });

    c.bench_function("elementwise_array_cast_1024", |b| {
        let elements: Vec<Value> = (0..1024).map(Value::from_i32).collect();
        let source = Value::array_or_vector(Type::int32().array_of(1024), &elements);
        b.iter(|| black_box(&source).try_cast_to_type(&Type::int64().array_of(1024)));
    });

    c.bench_function("print_array_64", |b| {
        let elements: Vec<Value> = (0..64).map(|i| Value::from_f32(i as f32 * 0.5)).collect();
        let source = Value::array_or_vector(Type::float32().array_of(64), &elements);
        b.iter(|| black_box(&source).description());
    });
}

// ── Sanity-check passes ─────────────────────────────────────────────────

/// A unit with `count` simple processors, each with a stream output and a
/// run loop writing a constant.
fn build_unit(count: usize) -> (Ast, ModuleId) {
    let mut ast = Ast::new();
    let root = ast.add_module(Module::new(
        Context::new(CodeLocation::none(), None),
        ModuleKind::Namespace,
        "root",
    ));

    for i in 0..count {
        let pc = Context::new(CodeLocation::none(), Some(ScopeRef::Module(root)));
        let p = ast.add_module(Module::new(pc, ModuleKind::Processor, format!("P{i}")));
        ast.module_mut(root).sub_modules.push(p);
        let c = Context::new(CodeLocation::none(), Some(ScopeRef::Module(p)));

        let ty = ast.add_expr(
            c,
            ExprKind::ConcreteType(Type::vector(Primitive::Float32, 1)),
        );
        let mut endpoint = Endpoint::new(c, "out", false, EndpointKind::Stream);
        endpoint.data_types.push(ty);
        let out = ast.add_endpoint(endpoint);
        ast.module_mut(p).endpoints.push(out);

        let rt = ast.add_expr(c, ExprKind::ConcreteType(Type::void()));
        let f = ast.add_function(Function::new(c, "run"));
        ast.function_mut(f).return_type = Some(rt);
        ast.module_mut(p).functions.push(f);

        let block = ast.add_block(Block {
            context: Context::new(CodeLocation::none(), Some(ScopeRef::Function(f))),
            function: Some(f),
            enclosing_stmt: None,
            statements: Vec::new(),
        });
        let bc = Context::new(CodeLocation::none(), Some(ScopeRef::Block(block)));

        let target = ast.add_expr(bc, ExprKind::OutputEndpointRef(out));
        let value = ast.add_expr(bc, ExprKind::Constant(Value::from_f32(0.0)));
        let write = ast.add_expr(bc, ExprKind::WriteToEndpoint { target, value });
        let write_stmt = ast.add_stmt(bc, StmtKind::Expr(write));
        let advance = ast.add_expr(bc, ExprKind::AdvanceClock);
        let advance_stmt = ast.add_stmt(bc, StmtKind::Expr(advance));
        ast.block_mut(block).statements = vec![write_stmt, advance_stmt];
        ast.function_mut(f).block = Some(block);
    }

    (ast, root)
}

fn bench_sanity_checks(c: &mut Criterion) {
    let (ast, root) = build_unit(64);

    c.bench_function("pre_resolution_64_processors", |b| {
        b.iter(|| check::run_pre_resolution(black_box(&ast), root));
    });

    c.bench_function("post_resolution_64_processors", |b| {
        b.iter(|| check::run_post_resolution(black_box(&ast), root));
    });
}

criterion_group!(benches, bench_value_coercion, bench_sanity_checks);
criterion_main!(benches);
