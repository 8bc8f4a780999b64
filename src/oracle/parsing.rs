use chumsky::prelude::*;
use itertools::Itertools;

use super::{
    expr::{Expr, Func},
    OracleError,
};
use crate::common::Name;

fn ident() -> impl Parser<char, Name, Error = Simple<char>> + Clone {
    text::ident()
        .then(just('\'').ignore_then(text::digits(10)).or_not())
        .map(|(stem, n): (String, Option<String>)| match n {
            Some(n) => Name(format!("{stem}'{n}")),
            None => Name(stem),
        })
}

fn number() -> impl Parser<char, Expr, Error = Simple<char>> + Clone {
    text::int(10)
        .then(just('.').ignore_then(text::digits(10)).or_not())
        .try_map(|(int, frac): (String, Option<String>), span| {
            let src = match frac {
                Some(frac) => format!("{int}.{frac}"),
                None => int,
            };
            src.parse::<f64>()
                .map(Expr::Num)
                .map_err(|e| Simple::custom(span, e.to_string()))
        })
}

pub(crate) fn expr() -> impl Parser<char, Expr, Error = Simple<char>> + Clone {
    recursive(|expr| {
        let call_or_var = ident()
            .then(
                expr.clone()
                    .padded()
                    .delimited_by(just('('), just(')'))
                    .or_not(),
            )
            .try_map(|(name, arg), span| match arg {
                None => Ok(Expr::Var(name)),
                Some(arg) => Func::from_name(&name.0)
                    .map(|f| Expr::Call(f, Box::new(arg)))
                    .ok_or_else(|| Simple::custom(span, format!("Unknown function \"{name}\""))),
            });

        let atom = number()
            .or(call_or_var)
            .or(expr.padded().delimited_by(just('('), just(')')))
            .padded();

        // Power binds tighter than negation on its left but accepts a signed
        // exponent: `-x**-2` is `-(x**(-2))`.
        let unary = recursive(|unary| {
            let power = atom
                .clone()
                .then(
                    just("**")
                        .or(just("^"))
                        .padded()
                        .ignore_then(unary.clone())
                        .or_not(),
                )
                .map(|(base, exp)| match exp {
                    Some(exp) => Expr::Pow(Box::new(base), Box::new(exp)),
                    None => base,
                });

            just('-')
                .padded()
                .ignore_then(unary)
                .map(|e| Expr::Neg(Box::new(e)))
                .or(power)
        });

        let product = unary
            .clone()
            .then(one_of("*/").padded().then(unary).repeated())
            .foldl(|l, (op, r)| match op {
                '*' => Expr::Mul(Box::new(l), Box::new(r)),
                _ => Expr::Div(Box::new(l), Box::new(r)),
            });

        product
            .clone()
            .then(one_of("+-").padded().then(product).repeated())
            .foldl(|l, (op, r)| match op {
                '+' => Expr::Add(Box::new(l), Box::new(r)),
                _ => Expr::Sub(Box::new(l), Box::new(r)),
            })
    })
}

pub(crate) fn parse(src: &str) -> Result<Expr, OracleError> {
    expr()
        .padded()
        .then_ignore(end())
        .parse(src)
        .map_err(|errs| {
            OracleError::Parse(
                src.to_owned(),
                errs.into_iter().map(|e| e.to_string()).join("; "),
            )
        })
}
