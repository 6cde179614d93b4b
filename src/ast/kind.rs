use serde::{Deserialize, Serialize};

/// Invokes `$callback!` with the full `Kind => visit_method` table so that
/// the kind enum and the visitor trait are generated from one list.
macro_rules! with_node_kinds {
    ($callback:ident) => {
        $callback! {
            // Declarations
            CompilationUnit => visit_compilation_unit,
            Class => visit_class,
            Interface => visit_interface,
            Trait => visit_trait,
            Function => visit_function,
            Method => visit_method,
            Closure => visit_closure,
            FormalParameters => visit_formal_parameters,
            FormalParameter => visit_formal_parameter,
            ClosureUse => visit_closure_use,
            FieldDeclaration => visit_field_declaration,
            VariableDeclarator => visit_variable_declarator,
            ConstantDefinition => visit_constant_definition,
            ConstantDeclarator => visit_constant_declarator,
            TraitUseStatement => visit_trait_use_statement,
            TraitAdaptation => visit_trait_adaptation,
            TraitAdaptationAlias => visit_trait_adaptation_alias,
            TraitAdaptationPrecedence => visit_trait_adaptation_precedence,

            // Types and references
            ScalarType => visit_scalar_type,
            TypeArray => visit_type_array,
            TypeCallable => visit_type_callable,
            UnionType => visit_union_type,
            ClassOrInterfaceReference => visit_class_or_interface_reference,
            ClassReference => visit_class_reference,
            TraitReference => visit_trait_reference,
            ParentReference => visit_parent_reference,
            SelfReference => visit_self_reference,
            StaticReference => visit_static_reference,

            // Statements
            ScopeStatement => visit_scope_statement,
            Statement => visit_statement,
            IfStatement => visit_if_statement,
            ElseIfStatement => visit_else_if_statement,
            ForStatement => visit_for_statement,
            ForInit => visit_for_init,
            ForUpdate => visit_for_update,
            ForeachStatement => visit_foreach_statement,
            WhileStatement => visit_while_statement,
            DoWhileStatement => visit_do_while_statement,
            SwitchStatement => visit_switch_statement,
            SwitchLabel => visit_switch_label,
            TryStatement => visit_try_statement,
            CatchStatement => visit_catch_statement,
            FinallyStatement => visit_finally_statement,
            ThrowStatement => visit_throw_statement,
            ReturnStatement => visit_return_statement,
            BreakStatement => visit_break_statement,
            ContinueStatement => visit_continue_statement,
            EchoStatement => visit_echo_statement,
            GlobalStatement => visit_global_statement,
            StaticVariableDeclaration => visit_static_variable_declaration,
            UnsetStatement => visit_unset_statement,
            DeclareStatement => visit_declare_statement,
            GotoStatement => visit_goto_statement,
            LabelStatement => visit_label_statement,

            // Expressions
            Expression => visit_expression,
            BooleanAndExpression => visit_boolean_and_expression,
            BooleanOrExpression => visit_boolean_or_expression,
            LogicalAndExpression => visit_logical_and_expression,
            LogicalOrExpression => visit_logical_or_expression,
            LogicalXorExpression => visit_logical_xor_expression,
            InstanceOfExpression => visit_instance_of_expression,
            ConditionalExpression => visit_conditional_expression,
            UnaryExpression => visit_unary_expression,
            PreIncrementExpression => visit_pre_increment_expression,
            PreDecrementExpression => visit_pre_decrement_expression,
            PostfixExpression => visit_postfix_expression,
            CastExpression => visit_cast_expression,
            AssignmentExpression => visit_assignment_expression,
            AllocationExpression => visit_allocation_expression,
            CloneExpression => visit_clone_expression,
            Arguments => visit_arguments,
            Literal => visit_literal,
            Constant => visit_constant,
            Variable => visit_variable,
            VariableVariable => visit_variable_variable,
            CompoundVariable => visit_compound_variable,
            CompoundExpression => visit_compound_expression,
            Identifier => visit_identifier,
            Array => visit_array,
            ArrayElement => visit_array_element,
            ArrayIndexExpression => visit_array_index_expression,
            MemberPrimaryPrefix => visit_member_primary_prefix,
            MethodPostfix => visit_method_postfix,
            PropertyPostfix => visit_property_postfix,
            FunctionPostfix => visit_function_postfix,
            ConstantPostfix => visit_constant_postfix,
            ClassFqnPostfix => visit_class_fqn_postfix,
            ListExpression => visit_list_expression,
            IssetExpression => visit_isset_expression,
            EmptyExpression => visit_empty_expression,
            EvalExpression => visit_eval_expression,
            IncludeExpression => visit_include_expression,
            RequireExpression => visit_require_expression,
            ExitExpression => visit_exit_expression,
            PrintExpression => visit_print_expression,
            YieldExpression => visit_yield_expression,
            String => visit_string,
            HeredocString => visit_heredoc_string,
            ShellExecExpression => visit_shell_exec_expression,
        }
    };
}

pub(crate) use with_node_kinds;

macro_rules! define_node_kind {
    ($($kind:ident => $visit:ident,)*) => {
        /// Concrete variant of an AST node.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum NodeKind {
            $($kind,)*
        }

        impl NodeKind {
            pub const ALL: &'static [NodeKind] = &[$(NodeKind::$kind,)*];

            pub fn name(&self) -> &'static str {
                match self {
                    $(NodeKind::$kind => stringify!($kind),)*
                }
            }
        }
    };
}

with_node_kinds!(define_node_kind);

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Abstract groups of node kinds, used where a lookup asks for "any
/// expression" rather than one concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    Expression,
    Statement,
    Declaration,
    Callable,
    Type,
    Reference,
    Postfix,
    Literal,
}

impl NodeCategory {
    pub fn contains(&self, kind: NodeKind) -> bool {
        use NodeKind::*;
        match self {
            NodeCategory::Expression => matches!(
                kind,
                Expression
                    | BooleanAndExpression
                    | BooleanOrExpression
                    | LogicalAndExpression
                    | LogicalOrExpression
                    | LogicalXorExpression
                    | InstanceOfExpression
                    | ConditionalExpression
                    | UnaryExpression
                    | PreIncrementExpression
                    | PreDecrementExpression
                    | PostfixExpression
                    | CastExpression
                    | AssignmentExpression
                    | AllocationExpression
                    | CloneExpression
                    | Variable
                    | VariableVariable
                    | CompoundVariable
                    | CompoundExpression
                    | Array
                    | ArrayIndexExpression
                    | MemberPrimaryPrefix
                    | ListExpression
                    | IssetExpression
                    | EmptyExpression
                    | EvalExpression
                    | IncludeExpression
                    | RequireExpression
                    | ExitExpression
                    | PrintExpression
                    | YieldExpression
                    | Closure
                    | ShellExecExpression
            ),
            NodeCategory::Statement => matches!(
                kind,
                ScopeStatement
                    | Statement
                    | IfStatement
                    | ElseIfStatement
                    | ForStatement
                    | ForeachStatement
                    | WhileStatement
                    | DoWhileStatement
                    | SwitchStatement
                    | TryStatement
                    | CatchStatement
                    | FinallyStatement
                    | ThrowStatement
                    | ReturnStatement
                    | BreakStatement
                    | ContinueStatement
                    | EchoStatement
                    | GlobalStatement
                    | StaticVariableDeclaration
                    | UnsetStatement
                    | DeclareStatement
                    | GotoStatement
                    | LabelStatement
                    | TraitUseStatement
            ),
            NodeCategory::Declaration => {
                matches!(kind, Class | Interface | Trait | Function | Method)
            }
            NodeCategory::Callable => matches!(kind, Function | Method | Closure),
            NodeCategory::Type => matches!(
                kind,
                ScalarType
                    | TypeArray
                    | TypeCallable
                    | UnionType
                    | ClassOrInterfaceReference
                    | ParentReference
                    | SelfReference
                    | StaticReference
            ),
            NodeCategory::Reference => matches!(
                kind,
                ClassOrInterfaceReference
                    | ClassReference
                    | TraitReference
                    | ParentReference
                    | SelfReference
                    | StaticReference
            ),
            NodeCategory::Postfix => matches!(
                kind,
                MethodPostfix | PropertyPostfix | FunctionPostfix | ConstantPostfix | ClassFqnPostfix
            ),
            NodeCategory::Literal => matches!(kind, Literal | String | HeredocString),
        }
    }
}

/// Predicate over node kinds accepted by the tree search helpers.
pub trait NodeMatcher {
    fn matches(&self, kind: NodeKind) -> bool;
}

impl NodeMatcher for NodeKind {
    fn matches(&self, kind: NodeKind) -> bool {
        *self == kind
    }
}

impl NodeMatcher for NodeCategory {
    fn matches(&self, kind: NodeKind) -> bool {
        self.contains(kind)
    }
}

impl NodeMatcher for [NodeKind] {
    fn matches(&self, kind: NodeKind) -> bool {
        self.contains(&kind)
    }
}

impl<const N: usize> NodeMatcher for [NodeKind; N] {
    fn matches(&self, kind: NodeKind) -> bool {
        self.contains(&kind)
    }
}

impl<M: NodeMatcher + ?Sized> NodeMatcher for &M {
    fn matches(&self, kind: NodeKind) -> bool {
        (**self).matches(kind)
    }
}

/// Classification of a cast expression, derived from its normalized image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastKind {
    Bool,
    Int,
    Float,
    String,
    Array,
    Object,
    Unset,
}

impl CastKind {
    /// Accepts either a bare keyword or a cast image such as `(float)`.
    pub fn from_image(image: &str) -> Option<CastKind> {
        let keyword = image.trim().trim_start_matches('(').trim_end_matches(')').trim();
        match keyword.to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Some(CastKind::Bool),
            "int" | "integer" => Some(CastKind::Int),
            "real" | "float" | "double" => Some(CastKind::Float),
            "string" | "binary" => Some(CastKind::String),
            "array" => Some(CastKind::Array),
            "object" => Some(CastKind::Object),
            "unset" => Some(CastKind::Unset),
            _ => None,
        }
    }
}

/// Normalizes a raw cast token image: `"( FLOAT )"` becomes `"(float)"`.
pub fn normalize_cast_image(raw: &str) -> String {
    let keyword = raw.trim().trim_start_matches('(').trim_end_matches(')').trim();
    format!("({})", keyword.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cast_images_are_normalized() {
        assert_eq!(normalize_cast_image("( FLOAT )"), "(float)");
        assert_eq!(normalize_cast_image("(Integer)"), "(integer)");
        assert_eq!(CastKind::from_image("( FLOAT )"), Some(CastKind::Float));
        assert_eq!(CastKind::from_image("(real)"), Some(CastKind::Float));
        assert_eq!(CastKind::from_image("(boolean)"), Some(CastKind::Bool));
        assert_eq!(CastKind::from_image("binary"), Some(CastKind::String));
        assert_eq!(CastKind::from_image("(resource)"), None);
    }
}
