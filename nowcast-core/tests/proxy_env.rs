//! Process-wide proxy scrubbing. Kept alone in its own binary because it
//! mutates the environment.

use std::env;

use nowcast_core::net::scrub_proxy_env;

#[test]
fn scrub_removes_proxies_and_disables_proxying() {
    // SAFETY: the only test in this binary, so nothing else reads the environment.
    unsafe {
        env::set_var("HTTPS_PROXY", "http://proxy.invalid:3128");
        env::set_var("http_proxy", "http://proxy.invalid:3128");
        env::set_var("ALL_PROXY", "socks5://proxy.invalid:1080");
    }

    scrub_proxy_env();

    for var in ["HTTPS_PROXY", "http_proxy", "ALL_PROXY"] {
        assert!(env::var_os(var).is_none(), "{var} survived");
    }
    assert_eq!(env::var("no_proxy").as_deref(), Ok("*"));
    assert_eq!(env::var("NO_PROXY").as_deref(), Ok("*"));

    // second call is a no-op; it must not restore or panic
    // SAFETY: as above.
    unsafe { env::set_var("HTTPS_PROXY", "http://late.invalid:3128") };
    scrub_proxy_env();
    assert_eq!(
        env::var("HTTPS_PROXY").as_deref(),
        Ok("http://late.invalid:3128")
    );
}
