//! ABOUTME: Abstract syntax tree for the `${{ ... }}` expression grammar
//! ABOUTME: Produced by `parser::parse`, consumed by `eval::evaluate`

/// A parsed expression, ready for evaluation against an `ExprContext`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Expr>),
    Map(Vec<(String, Expr)>),
    Reference(Reference),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Ternary {
        when_true: Box<Expr>,
        cond: Box<Expr>,
        when_false: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// `inputs.x`, `steps.build.output[0].path`, `item.name`, `index` — a root
/// reference followed by zero or more field/index accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub root: RootRef,
    pub accessors: Vec<Accessor>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RootRef {
    Inputs,
    StepOutput(String),
    Item,
    Index,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Accessor {
    Field(String),
    Index(i64),
    Key(String),
}
