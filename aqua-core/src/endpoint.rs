//! Endpoint compilation.
//!
//! An [`Endpoint`] is the immutable record built for every declared field:
//! the invoker, the resolved fixture, the derived URLs and mux variables,
//! the attached modules and cache store. All signature validation happens
//! here, at registration time.

use crate::error::SetupError;
use crate::fixture::Fixture;
use crate::invoker::MethodInvoker;
use crate::modules::{Authorizer, Module};
use crate::signature::Sig;
use crate::utils::{clean_url, extract_route_var_patterns, extract_route_vars};
use aqua_cache::CacheStore;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// An immutable, validated endpoint.
pub struct Endpoint {
    pub invoker: MethodInvoker,
    pub fixture: Fixture,
    /// `GET`, `POST`, `PUT`, `PATCH`, `DELETE`, or `CRUD` (validation only).
    pub http_method: String,

    pub std_handler: bool,
    pub needs_aide: bool,

    pub url_with_version: String,
    pub url_wo_version: String,
    /// Mux variable names in URL order.
    pub mux_vars: Vec<String>,
    /// Compiled `{name:regex}` constraints, positionally aligned with
    /// `mux_vars`. Anchored to the full captured segment.
    pub(crate) mux_patterns: Vec<Option<Regex>>,
    pub(crate) modules: Vec<Module>,
    pub(crate) stash: Option<Arc<dyn CacheStore>>,
    /// Pre-parsed `fixture.ttl`.
    pub(crate) cache_ttl: Option<Duration>,
    pub(crate) auth: Option<Arc<dyn Authorizer>>,

    /// The URL this endpoint is registered under.
    pub svc_url: String,
    /// Routing-table key, `METHOD:svc_url`.
    pub svc_id: String,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("invoker", &self.invoker)
            .field("fixture", &self.fixture)
            .field("http_method", &self.http_method)
            .field("std_handler", &self.std_handler)
            .field("needs_aide", &self.needs_aide)
            .field("url_with_version", &self.url_with_version)
            .field("url_wo_version", &self.url_wo_version)
            .field("mux_vars", &self.mux_vars)
            .field("mux_patterns", &self.mux_patterns)
            .field("modules", &self.modules.len())
            .field("stash", &self.stash.is_some())
            .field("cache_ttl", &self.cache_ttl)
            .field("auth", &self.auth.is_some())
            .field("svc_url", &self.svc_url)
            .field("svc_id", &self.svc_id)
            .finish()
    }
}

impl Endpoint {
    /// Compile and validate an endpoint.
    ///
    /// Stub endpoints (`fixture.stub` non-empty) skip signature validation
    /// and serve the file contents instead.
    pub fn new(
        invoker: MethodInvoker,
        fixture: Fixture,
        http_method: &str,
        mods: &HashMap<String, Module>,
        caches: &HashMap<String, Arc<dyn CacheStore>>,
        auth: Option<Arc<dyn Authorizer>>,
    ) -> Result<Endpoint, SetupError> {
        let versioned = format!("v{}", fixture.version);
        let url_with_version = clean_url(&[
            fixture.prefix.as_str(),
            versioned.as_str(),
            fixture.root.as_str(),
            fixture.url.as_str(),
        ]);
        let url_wo_version = clean_url(&[
            fixture.prefix.as_str(),
            fixture.root.as_str(),
            fixture.url.as_str(),
        ]);
        let svc_url = if fixture.version.is_empty() {
            url_wo_version.clone()
        } else {
            url_with_version.clone()
        };
        let svc_id = format!("{http_method}:{svc_url}");

        let mux_vars = extract_route_vars(&fixture.url);
        let mut mux_patterns = Vec::with_capacity(mux_vars.len());
        for pattern in extract_route_var_patterns(&fixture.url) {
            match pattern {
                None => mux_patterns.push(None),
                Some(raw) => {
                    let anchored = format!("^(?:{raw})$");
                    let re = Regex::new(&anchored).map_err(|_| SetupError::BadMuxPattern {
                        url: svc_url.clone(),
                        pattern: raw,
                    })?;
                    mux_patterns.push(Some(re));
                }
            }
        }

        let mut out = Endpoint {
            invoker,
            fixture,
            http_method: http_method.to_string(),
            std_handler: false,
            needs_aide: false,
            url_with_version,
            url_wo_version,
            mux_vars,
            mux_patterns,
            modules: Vec::new(),
            stash: None,
            cache_ttl: None,
            auth,
            svc_url,
            svc_id,
        };

        // All validations are skipped for mock stubs.
        if out.fixture.stub.is_empty() {
            out.std_handler = out.matches_std_handler();
            out.needs_aide = out.check_aide_input()?;

            out.validate_mux_vars_match_inputs()?;
            out.validate_input_types()?;
            out.validate_outputs()?;
            out.parse_ttl()?;
        }

        // Attach the modules the fixture names.
        if !out.fixture.modules.is_empty() {
            for name in out.fixture.modules.split(',') {
                let name = name.trim();
                match mods.get(name) {
                    Some(module) => out.modules.push(module.clone()),
                    None => {
                        return Err(SetupError::ModuleMissing {
                            name: name.to_string(),
                        })
                    }
                }
            }
        }

        // Bind the cache store, unless it is a mock stub.
        if out.fixture.stub.is_empty() {
            match caches.get(&out.fixture.cache) {
                Some(store) => out.stash = Some(store.clone()),
                None => {
                    if !out.fixture.cache.is_empty() {
                        return Err(SetupError::CacheMissing {
                            name: out.fixture.cache.clone(),
                            url: out.svc_url.clone(),
                        });
                    }
                }
            }
        }

        Ok(out)
    }

    fn matches_std_handler(&self) -> bool {
        self.invoker.out_count() == 0
            && self.invoker.inp_count() == 2
            && self.invoker.inp_sigs == Sig::std_handler_inputs()
    }

    fn check_aide_input(&self) -> Result<bool, SetupError> {
        let aide = Sig::aide();
        let count = self.invoker.inp_count();
        for sig in self.invoker.inp_sigs.iter().take(count.saturating_sub(1)) {
            if *sig == aide {
                return Err(SetupError::AideNotLast {
                    method_name: self.invoker.full_name(),
                });
            }
        }
        Ok(count > 0 && self.invoker.inp_sigs[count - 1] == aide)
    }

    fn validate_mux_vars_match_inputs(&self) -> Result<(), SetupError> {
        if self.std_handler {
            return Ok(());
        }
        let mut inputs = self.invoker.inp_count();
        if self.needs_aide {
            inputs -= 1;
        }
        if self.http_method == "CRUD" {
            if inputs != 0 {
                return Err(SetupError::BadCrud {
                    method_name: self.invoker.full_name(),
                    reason: "Crud methods should not take any inputs".into(),
                });
            }
        } else if self.mux_vars.len() != inputs {
            return Err(SetupError::InputCountMismatch {
                url: self.url_with_version.clone(),
                method_name: self.invoker.full_name(),
                mux_vars: self.mux_vars.len(),
                inputs,
            });
        }
        Ok(())
    }

    fn validate_input_types(&self) -> Result<(), SetupError> {
        if self.std_handler {
            return Ok(());
        }
        let aide = Sig::aide();
        for sig in &self.invoker.inp_sigs {
            match sig {
                Sig::Int | Sig::Uint | Sig::Str => {}
                s if *s == aide => {}
                other => {
                    return Err(SetupError::BadInputType {
                        method_name: self.invoker.full_name(),
                        observed: other.to_string(),
                    })
                }
            }
        }
        Ok(())
    }

    fn validate_outputs(&self) -> Result<(), SetupError> {
        if self.http_method == "CRUD" {
            if self.invoker.out_count() != 1 {
                return Err(SetupError::BadCrud {
                    method_name: self.invoker.full_name(),
                    reason: "must return 1 param only".into(),
                });
            }
            if self.invoker.out_sigs[0] != Sig::crud() {
                return Err(SetupError::BadCrud {
                    method_name: self.invoker.full_name(),
                    reason: "return must be of type Crud".into(),
                });
            }
            return Ok(());
        }
        if self.std_handler {
            return Ok(());
        }
        match self.invoker.out_count() {
            1 => {
                let sig = &self.invoker.out_sigs[0];
                if !sig.is_acceptable_output() {
                    return Err(SetupError::BadOutput {
                        method_name: self.invoker.full_name(),
                        observed: sig.to_string(),
                    });
                }
            }
            2 => {
                let first = &self.invoker.out_sigs[0];
                let second = &self.invoker.out_sigs[1];
                if *first == Sig::Int {
                    if !second.is_acceptable_output() {
                        return Err(SetupError::BadOutput {
                            method_name: self.invoker.full_name(),
                            observed: second.to_string(),
                        });
                    }
                } else if *second == Sig::ErrorIface {
                    if !first.is_acceptable_output() {
                        return Err(SetupError::BadOutput {
                            method_name: self.invoker.full_name(),
                            observed: first.to_string(),
                        });
                    }
                } else {
                    return Err(SetupError::BadOutput {
                        method_name: self.invoker.full_name(),
                        observed: format!("{first},{second}"),
                    });
                }
            }
            _ => {
                return Err(SetupError::BadOutput {
                    method_name: self.invoker.full_name(),
                    observed: format!("{} returns", self.invoker.out_count()),
                })
            }
        }
        Ok(())
    }

    fn parse_ttl(&mut self) -> Result<(), SetupError> {
        if self.fixture.ttl.is_empty() {
            return Ok(());
        }
        match humantime::parse_duration(&self.fixture.ttl) {
            Ok(d) => {
                self.cache_ttl = Some(d);
                Ok(())
            }
            Err(_) => Err(SetupError::BadTtl {
                url: self.svc_url.clone(),
                ttl: self.fixture.ttl.clone(),
            }),
        }
    }

    /// The two Accept-header values that alias this endpoint at its
    /// unversioned URL.
    pub(crate) fn accept_aliases(&self) -> (String, String) {
        (
            format!(
                "application/{}-v{}+json",
                self.fixture.vendor, self.fixture.version
            ),
            format!(
                "application/{}+json;version={}",
                self.fixture.vendor, self.fixture.version
            ),
        )
    }
}
