use vtu_results::config::Config;
use vtu_results::infrastructure::{ChromiumDriver, Locator, SessionDriver};
use vtu_results::logger;
use vtu_results::services::{ColorIsolationSolver, TesseractOcr};
use vtu_results::workflow::{FetchCtx, FetchFlow, FetchSettings};

#[tokio::test]
#[ignore] // 默认忽略，需要本机浏览器和网络：cargo test -- --ignored
async fn test_portal_form_is_reachable() {
    logger::init(true);
    let config = Config::from_env();

    let mut driver = ChromiumDriver::launch(&config)
        .await
        .expect("启动浏览器失败");
    driver.navigate(&config.base_url).await.expect("打开查询页失败");
    driver
        .wait_for_element(
            &Locator::name(&config.selectors.identifier_input),
            config.element_wait(),
        )
        .await
        .expect("学号输入框未出现");

    let image = driver
        .screenshot_element(&Locator::xpath(&config.selectors.captcha_image))
        .await
        .expect("验证码截图失败");
    assert!(!image.is_empty());

    driver.close().await.expect("关闭浏览器失败");
    // 重复关闭不报错
    driver.close().await.expect("重复关闭失败");
}

#[tokio::test]
#[ignore]
async fn test_fetch_single_identifier() {
    logger::init(true);
    let config = Config::from_env();
    let usn = std::env::var("VTU_TEST_USN").unwrap_or_else(|_| "1CR24BA001".to_string());

    let mut driver = ChromiumDriver::launch(&config)
        .await
        .expect("启动浏览器失败");
    let solver = ColorIsolationSolver::new(
        TesseractOcr::new(&config.tesseract_binary).with_extra_args(config.tesseract_args.clone()),
    );
    let flow = FetchFlow::new(FetchSettings::from_config(&config));

    let ctx = FetchCtx::new(usn.as_str().into(), 1, 1);
    let report = flow.run(&mut driver, &solver, &ctx).await;
    driver.close().await.expect("关闭浏览器失败");

    println!("{} 次尝试: {:?}", report.attempt_count(), report.outcome.summary());
    assert!(report.attempt_count() >= 1);
}
