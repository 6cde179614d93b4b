use std::io::Read;

use php_depend::ast::sexpr::SExprFormatter;
use php_depend::{Builder, SourceFile};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let path = std::env::args().nth(1);
    let source = match &path {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer).map(|_| buffer)
        }
    };
    let source = match source {
        Ok(source) => source,
        Err(err) => {
            eprintln!("failed to read input: {err}");
            std::process::exit(1);
        }
    };

    let builder = Builder::new();
    let file = SourceFile::new(path.as_deref().unwrap_or("<stdin>"), source);
    match builder.parse_source(&file) {
        Ok(ast) => {
            if let Some(root) = ast.root() {
                println!("{}", SExprFormatter::format(&ast, root));
            }
            for entity in builder.entities() {
                if let Some(kind) = entity.kind() {
                    println!("{kind:?} {} [{}]", entity.name(), entity.package().unwrap_or_default());
                }
            }
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
