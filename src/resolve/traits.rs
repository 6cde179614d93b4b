use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::debug;

use crate::builder::{Builder, Declaration, EntityId, TraitAlias};
use crate::error::ResolveError;
use crate::resolve::{MemberOrigin, ResolvedMethod};

impl Builder {
    /// Methods contributed by the traits `decl` uses, after `insteadof`
    /// exclusions and `as` aliases are applied.
    pub(crate) fn trait_methods(
        &self,
        decl: &Declaration,
        path: &mut Vec<EntityId>,
    ) -> Result<IndexMap<String, ResolvedMethod>, ResolveError> {
        let own: HashSet<String> = decl.methods.iter().map(|m| m.name.to_ascii_lowercase()).collect();
        let mut methods = IndexMap::new();

        for trait_use in &decl.trait_uses {
            for reference in &trait_use.traits {
                let used = reference.resolve(self);
                let provided = self.all_methods_inner(used, path)?;

                for method in provided.values() {
                    let mut original = method.with_origin(MemberOrigin::Trait);
                    let mut renamed = Vec::new();
                    let excluded = self.is_excluded(decl, used, &method.name);

                    for alias in self.aliases_for(decl, used, &method.name) {
                        // An unqualified alias follows the `insteadof` winner only.
                        if excluded && alias.trait_ref.is_none() {
                            continue;
                        }
                        let modifiers = match alias.visibility {
                            Some(visibility) => original.modifiers.with_visibility(visibility),
                            None => original.modifiers,
                        };
                        match &alias.new_name {
                            Some(new_name) => renamed.push(ResolvedMethod {
                                name: new_name.clone(),
                                modifiers,
                                ..original.clone()
                            }),
                            None => original.modifiers = modifiers,
                        }
                    }

                    if excluded {
                        debug!(method = %method.name, owner = %decl.name, "trait method excluded by insteadof");
                    } else {
                        insert_trait_method(&mut methods, original, &own, decl)?;
                    }
                    for alias in renamed {
                        insert_trait_method(&mut methods, alias, &own, decl)?;
                    }
                }
            }
        }

        Ok(methods)
    }

    fn aliases_for<'d>(&self, decl: &'d Declaration, used: EntityId, method: &str) -> Vec<&'d TraitAlias> {
        decl.trait_uses
            .iter()
            .flat_map(|u| &u.aliases)
            .filter(|alias| alias.method.eq_ignore_ascii_case(method))
            .filter(|alias| alias.trait_ref.as_ref().is_none_or(|r| r.resolve(self) == used))
            .collect()
    }

    fn is_excluded(&self, decl: &Declaration, used: EntityId, method: &str) -> bool {
        decl.trait_uses
            .iter()
            .flat_map(|u| &u.precedences)
            .filter(|p| p.method.eq_ignore_ascii_case(method))
            .any(|p| p.insteadof.iter().any(|r| r.resolve(self) == used))
    }
}

fn insert_trait_method(
    methods: &mut IndexMap<String, ResolvedMethod>,
    method: ResolvedMethod,
    own: &HashSet<String>,
    decl: &Declaration,
) -> Result<(), ResolveError> {
    let key = method.name.to_ascii_lowercase();
    let Some(existing) = methods.get(&key) else {
        methods.insert(key, method);
        return Ok(());
    };

    let same_body = existing.declaring == method.declaring
        && existing.original_name.eq_ignore_ascii_case(&method.original_name);
    if same_body || method.is_abstract() || own.contains(&key) {
        return Ok(());
    }
    if existing.is_abstract() {
        methods.insert(key, method);
        return Ok(());
    }
    Err(ResolveError::MethodCollision { method: method.name, name: decl.name.clone() })
}
