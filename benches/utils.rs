use rand::{Rng, SeedableRng, rngs::StdRng};
use twigit::ast::{BinaryOp, Expr, Foreach, If, Stmt};

/// Generate n random page-like programs to use in the benchmark
pub fn generate_random_programs(n: usize) -> Vec<Vec<Stmt>> {
    let mut rng = StdRng::seed_from_u64(42); // Fixed seed for reproducibility
    let mut programs = Vec::with_capacity(n);

    for _ in 0..n {
        let mut program = vec![
            Stmt::html("<h1>"),
            Stmt::echo(vec![escaped(Expr::var("title"))]),
            Stmt::html("</h1>\n"),
        ];

        let sections = rng.random_range(2..6);
        for _ in 0..sections {
            program.push(random_section(&mut rng, 0));
        }
        programs.push(program);
    }

    programs
}

fn escaped(expr: Expr) -> Expr {
    Expr::call("htmlspecialchars", vec![expr])
}

/// A loop, a conditional, or plain output, nesting up to two levels deep.
fn random_section(rng: &mut StdRng, depth: usize) -> Stmt {
    let owner = random_string(rng, 3, 8);
    match rng.random_range(0..3) {
        0 if depth < 2 => {
            let local = random_string(rng, 3, 8);
            let mut body = vec![Stmt::echo(vec![
                Expr::string("<li>"),
                escaped(Expr::property(Expr::var(local.as_str()), "name")),
            ])];
            if rng.random_bool(0.5) {
                body.push(random_section(rng, depth + 1));
            }
            body.push(Stmt::html("</li>\n"));

            Stmt::Foreach(Foreach {
                subject: Expr::property(Expr::var(owner.as_str()), "items"),
                key: None,
                value: Expr::var(local),
                body,
            })
        }
        1 if depth < 2 => {
            let cond = Expr::binary(
                BinaryOp::Gt,
                Expr::var(owner.as_str()),
                Expr::Int(rng.random_range(0..100)),
            );
            let else_body = rng
                .random_bool(0.5)
                .then(|| vec![Stmt::html("<p>none</p>")]);

            Stmt::If(If {
                cond,
                body: vec![random_section(rng, depth + 1)],
                elseifs: vec![],
                else_body,
            })
        }
        _ => Stmt::echo(vec![
            Expr::string("<span>"),
            Expr::concat(Expr::var(owner), Expr::string("</span>\n")),
        ]),
    }
}

/// Generate a random string with length between min and max
fn random_string(rng: &mut StdRng, min_len: usize, max_len: usize) -> String {
    let charset = "abcdefghijklmnopqrstuvwxyz";
    let len = rng.random_range(min_len..=max_len);

    (0..len)
        .map(|_| {
            let idx = rng.random_range(0..charset.len());
            charset.chars().nth(idx).unwrap()
        })
        .collect()
}
